use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::{
    chat_hub::ChatEvent,
    dto::chat::{
        ChatList, ChatThread, CreateChatRequest, DeleteMessageRequest, EditMessageRequest,
        SendMessageRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, decode_token},
    models::{Chat, ChatMessage},
    response::ApiResponse,
    services::chat_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_chats).post(open_chat))
        .route(
            "/messages",
            post(send_message).patch(edit_message).delete(delete_message),
        )
        .route("/{id}", get(chat_history))
        .route("/{id}/read", post(mark_read))
        .route("/{id}/ws", get(chat_socket))
}

#[utoipa::path(
    get,
    path = "/api/chat",
    responses(
        (status = 200, description = "Caller's chat threads", body = ApiResponse<ChatList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn list_chats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ChatList>>> {
    let resp = chat_service::list_user_chats(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = CreateChatRequest,
    responses(
        (status = 200, description = "Existing or new thread with the farm", body = ApiResponse<Chat>),
        (status = 404, description = "Farm not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn open_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateChatRequest>,
) -> AppResult<Json<ApiResponse<Chat>>> {
    let resp = chat_service::create_or_get_chat(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/chat/{id}",
    params(("id" = Uuid, Path, description = "Chat ID")),
    responses(
        (status = 200, description = "Thread with all messages", body = ApiResponse<ChatThread>),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn chat_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ChatThread>>> {
    let resp = chat_service::get_chat_history(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chat/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message stored and broadcast", body = ApiResponse<ChatMessage>),
        (status = 400, description = "Empty message"),
        (status = 403, description = "Not a participant")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<ChatMessage>>> {
    let resp = chat_service::send_message(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/chat/messages",
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Message edited", body = ApiResponse<ChatMessage>),
        (status = 403, description = "Not the sender")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn edit_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<EditMessageRequest>,
) -> AppResult<Json<ApiResponse<ChatMessage>>> {
    let resp = chat_service::edit_message(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/chat/messages",
    request_body = DeleteMessageRequest,
    responses(
        (status = 200, description = "Message deleted", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Not the sender")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn delete_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DeleteMessageRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = chat_service::delete_message(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/chat/{id}/read",
    params(("id" = Uuid, Path, description = "Chat ID")),
    responses(
        (status = 200, description = "Counterpart's messages marked read", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = chat_service::mark_read(&state, &user, id).await?;
    Ok(Json(resp))
}

#[derive(Debug, Deserialize)]
pub struct SocketAuth {
    pub token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// also arrive as `?token=`.
fn socket_token(headers: &HeaderMap, auth: SocketAuth) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .or(auth.token)
}

#[utoipa::path(
    get,
    path = "/api/chat/{id}/ws",
    params(
        ("id" = Uuid, Path, description = "Chat ID"),
        ("token" = Option<String>, Query, description = "JWT when no Authorization header is sent")
    ),
    responses(
        (status = 101, description = "Upgraded; chat events stream as JSON text frames"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not a participant")
    ),
    tag = "Chat"
)]
pub async fn chat_socket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(auth): Query<SocketAuth>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let token = socket_token(&headers, auth).ok_or(AppError::Unauthorized)?;
    let user = decode_token(&token, &state.config.jwt_secret)?;
    chat_service::authorize_subscription(&state, &user, id).await?;

    let events = state.chat.subscribe(id);
    tracing::debug!(chat_id = %id, user_id = %user.user_id, "chat subscriber joined");
    let hub = state.chat.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let events = relay_events(socket, events).await;
        hub.unsubscribe(id, events);
        tracing::debug!(chat_id = %id, "chat subscriber left");
    }))
}

/// Forwards events until either side closes, then hands the receiver back.
async fn relay_events(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<ChatEvent>,
) -> broadcast::Receiver<ChatEvent> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "failed to encode chat event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "chat subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_token_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        let auth = SocketAuth {
            token: Some("from-query".into()),
        };
        assert_eq!(socket_token(&headers, auth).as_deref(), Some("from-header"));

        let auth = SocketAuth {
            token: Some("from-query".into()),
        };
        assert_eq!(
            socket_token(&HeaderMap::new(), auth).as_deref(),
            Some("from-query")
        );
        assert!(socket_token(&HeaderMap::new(), SocketAuth { token: None }).is_none());
    }
}
