use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::catalog::{
        ApplyFarmRequest, CategoryList, FarmDetail, FarmList, FeaturedFarmList, WriteReviewRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Farm, Review},
    response::ApiResponse,
    routes::params::{FarmQuery, FeaturedQuery},
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_farms))
        .route("/featured", get(featured_farms))
        .route("/apply", post(apply_farm))
        .route("/mine", get(my_farm))
        .route("/reviews", post(write_review))
        .route("/{id}", get(get_farm))
}

pub fn categories_router() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

#[utoipa::path(
    get,
    path = "/api/farms",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search by farm name"),
        ("category_id" = Option<Uuid>, Query, description = "Filter by category")
    ),
    responses(
        (status = 200, description = "Approved farms", body = ApiResponse<FarmList>)
    ),
    tag = "Farms"
)]
pub async fn list_farms(
    State(state): State<AppState>,
    Query(query): Query<FarmQuery>,
) -> AppResult<Json<ApiResponse<FarmList>>> {
    let resp = catalog_service::list_public_farms(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/farms/featured",
    params(("limit" = Option<u64>, Query, description = "How many farms, default 6, at most 20")),
    responses(
        (status = 200, description = "Top rated approved farms", body = ApiResponse<FeaturedFarmList>)
    ),
    tag = "Farms"
)]
pub async fn featured_farms(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> AppResult<Json<ApiResponse<FeaturedFarmList>>> {
    let resp = catalog_service::featured_farms(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/farms/{id}",
    params(("id" = Uuid, Path, description = "Farm ID")),
    responses(
        (status = 200, description = "Farm with products and reviews", body = ApiResponse<FarmDetail>),
        (status = 404, description = "Farm not found")
    ),
    tag = "Farms"
)]
pub async fn get_farm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FarmDetail>>> {
    let resp = catalog_service::get_public_farm(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/farms/apply",
    request_body = ApplyFarmRequest,
    responses(
        (status = 200, description = "Application submitted", body = ApiResponse<Farm>),
        (status = 400, description = "Application already pending or farm exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Farms"
)]
pub async fn apply_farm(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ApplyFarmRequest>,
) -> AppResult<Json<ApiResponse<Farm>>> {
    let resp = catalog_service::apply_farm(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/farms/mine",
    responses(
        (status = 200, description = "Caller's farm in any status", body = ApiResponse<Farm>),
        (status = 404, description = "No farm")
    ),
    security(("bearer_auth" = [])),
    tag = "Farms"
)]
pub async fn my_farm(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Farm>>> {
    let resp = catalog_service::my_farm(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/farms/reviews",
    request_body = WriteReviewRequest,
    responses(
        (status = 200, description = "Review added", body = ApiResponse<Review>),
        (status = 400, description = "Rating out of range")
    ),
    security(("bearer_auth" = [])),
    tag = "Farms"
)]
pub async fn write_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<WriteReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = catalog_service::write_review(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "All categories", body = ApiResponse<CategoryList>)
    ),
    tag = "Farms"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = catalog_service::list_categories(&state).await?;
    Ok(Json(resp))
}
