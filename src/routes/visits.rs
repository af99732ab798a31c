use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::visits::{TrackVisitRequest, VisitAck},
    error::AppResult,
    middleware::client_ip::ClientIp,
    response::ApiResponse,
    services::visit_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(track_visit))
}

#[utoipa::path(
    post,
    path = "/api/visits",
    request_body = TrackVisitRequest,
    responses(
        (status = 200, description = "Visit recorded, or already seen within the hour", body = ApiResponse<VisitAck>),
        (status = 400, description = "Invalid path")
    ),
    tag = "Visits"
)]
pub async fn track_visit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<TrackVisitRequest>,
) -> AppResult<Json<ApiResponse<VisitAck>>> {
    let resp = visit_service::track_visit(&state, ip, payload).await?;
    Ok(Json(resp))
}
