use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

use crate::{
    audit,
    chat_hub::ChatEvent,
    dto::chat::{
        ChatList, ChatSummary, ChatThread, CreateChatRequest, DeleteMessageRequest,
        EditMessageRequest, SendMessageRequest,
    },
    entity::{
        ChatMessages, Chats, Farms,
        chat_messages::{ActiveModel as MessageActive, Column as MessageCol, Model as MessageModel},
        chats::{ActiveModel as ChatActive, Column as ChatCol, Model as ChatModel},
        farms::Column as FarmCol,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller},
    models::{Chat, ChatMessage},
    response::{ApiResponse, Meta},
    services::mapping::{chat_from_entity, message_from_entity},
    state::AppState,
};

/// Only the thread's customer and the farm's seller may take part in it.
pub fn can_post(thread_user_id: Uuid, farm_seller_id: Uuid, sender_id: Uuid) -> bool {
    sender_id == thread_user_id || sender_id == farm_seller_id
}

fn message_text(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("text is required"));
    }
    Ok(text.to_string())
}

/// Loads a thread and checks that `user` participates in it.
async fn participant_chat(state: &AppState, user: &AuthUser, chat_id: Uuid) -> AppResult<ChatModel> {
    let chat = Chats::find_by_id(chat_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Chat"))?;
    let seller_id = Farms::find_by_id(chat.farm_id)
        .one(&state.orm)
        .await?
        .map(|farm| farm.seller_id)
        .ok_or(AppError::NotFound("Farm"))?;

    if !can_post(chat.user_id, seller_id, user.user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(chat)
}

async fn own_message(
    state: &AppState,
    user: &AuthUser,
    chat_id: Uuid,
    message_id: Uuid,
) -> AppResult<MessageModel> {
    let message = ChatMessages::find_by_id(message_id)
        .filter(MessageCol::ChatId.eq(chat_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Message"))?;
    if message.sender_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(message)
}

pub async fn create_or_get_chat(
    state: &AppState,
    user: &AuthUser,
    payload: CreateChatRequest,
) -> AppResult<ApiResponse<Chat>> {
    let farm = Farms::find_by_id(payload.farm_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;

    let existing = Chats::find()
        .filter(ChatCol::FarmId.eq(farm.id))
        .filter(ChatCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    if let Some(chat) = existing {
        return Ok(ApiResponse::success(
            "Chat found",
            chat_from_entity(chat),
            Some(Meta::empty()),
        ));
    }

    let now = Utc::now();
    let chat = ChatActive {
        id: Set(Uuid::new_v4()),
        farm_id: Set(farm.id),
        user_id: Set(user.user_id),
        name: Set(farm.name),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Chat created",
        chat_from_entity(chat),
        Some(Meta::empty()),
    ))
}

pub async fn send_message(
    state: &AppState,
    user: &AuthUser,
    payload: SendMessageRequest,
) -> AppResult<ApiResponse<ChatMessage>> {
    let chat = participant_chat(state, user, payload.chat_id).await?;
    let text = message_text(&payload.text)?;

    let now = Utc::now();
    let message = MessageActive {
        id: Set(Uuid::new_v4()),
        chat_id: Set(chat.id),
        sender_id: Set(user.user_id),
        text: Set(text),
        read: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    let mut thread: ChatActive = chat.into();
    thread.updated_at = Set(now.into());
    thread.update(&state.orm).await?;

    let message = message_from_entity(message);
    let delivered = state.chat.publish(
        message.chat_id,
        ChatEvent::NewMessage {
            message: message.clone(),
        },
    );
    tracing::debug!(chat_id = %message.chat_id, delivered, "chat message sent");

    Ok(ApiResponse::success(
        "Message sent",
        message,
        Some(Meta::empty()),
    ))
}

pub async fn edit_message(
    state: &AppState,
    user: &AuthUser,
    payload: EditMessageRequest,
) -> AppResult<ApiResponse<ChatMessage>> {
    let text = message_text(&payload.text)?;
    let message = own_message(state, user, payload.chat_id, payload.message_id).await?;

    let mut active: MessageActive = message.into();
    active.text = Set(text);
    active.updated_at = Set(Utc::now().into());
    let message = message_from_entity(active.update(&state.orm).await?);

    state.chat.publish(
        message.chat_id,
        ChatEvent::MessageEdited {
            message: message.clone(),
        },
    );

    Ok(ApiResponse::success(
        "Message updated",
        message,
        Some(Meta::empty()),
    ))
}

pub async fn delete_message(
    state: &AppState,
    user: &AuthUser,
    payload: DeleteMessageRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let message = own_message(state, user, payload.chat_id, payload.message_id).await?;
    let (chat_id, message_id) = (message.chat_id, message.id);
    message.delete(&state.orm).await?;

    state.chat.publish(
        chat_id,
        ChatEvent::MessageDeleted {
            chat_id,
            message_id,
        },
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "chat_message_delete",
        "chat_messages",
        serde_json::json!({ "chat_id": chat_id, "message_id": message_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Message deleted",
        serde_json::json!({ "message_id": message_id }),
        Some(Meta::empty()),
    ))
}

/// Marks every message the reader did not send as read.
pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    chat_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let chat = participant_chat(state, user, chat_id).await?;

    let result = ChatMessages::update_many()
        .col_expr(MessageCol::Read, Expr::value(true))
        .filter(MessageCol::ChatId.eq(chat.id))
        .filter(MessageCol::SenderId.ne(user.user_id))
        .filter(MessageCol::Read.eq(false))
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Messages marked as read",
        serde_json::json!({ "updated": result.rows_affected }),
        Some(Meta::empty()),
    ))
}

async fn summarize(
    state: &AppState,
    reader_id: Uuid,
    chats: Vec<ChatModel>,
) -> AppResult<Vec<ChatSummary>> {
    let mut items = Vec::with_capacity(chats.len());
    for chat in chats {
        let last_message = ChatMessages::find()
            .filter(MessageCol::ChatId.eq(chat.id))
            .order_by_desc(MessageCol::CreatedAt)
            .one(&state.orm)
            .await?
            .map(message_from_entity);
        let unread = ChatMessages::find()
            .filter(MessageCol::ChatId.eq(chat.id))
            .filter(MessageCol::SenderId.ne(reader_id))
            .filter(MessageCol::Read.eq(false))
            .count(&state.orm)
            .await? as i64;
        items.push(ChatSummary {
            chat: chat_from_entity(chat),
            last_message,
            unread,
        });
    }
    Ok(items)
}

pub async fn list_user_chats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ChatList>> {
    let chats = Chats::find()
        .filter(ChatCol::UserId.eq(user.user_id))
        .order_by_desc(ChatCol::UpdatedAt)
        .all(&state.orm)
        .await?;
    let items = summarize(state, user.user_id, chats).await?;
    Ok(ApiResponse::success("Chats", ChatList { items }, Some(Meta::empty())))
}

pub async fn list_farm_chats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ChatList>> {
    ensure_seller(user)?;
    let farm = Farms::find()
        .filter(FarmCol::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Farm"))?;

    let chats = Chats::find()
        .filter(ChatCol::FarmId.eq(farm.id))
        .order_by_desc(ChatCol::UpdatedAt)
        .all(&state.orm)
        .await?;
    let items = summarize(state, user.user_id, chats).await?;
    Ok(ApiResponse::success("Chats", ChatList { items }, Some(Meta::empty())))
}

pub async fn get_chat_history(
    state: &AppState,
    user: &AuthUser,
    chat_id: Uuid,
) -> AppResult<ApiResponse<ChatThread>> {
    let chat = participant_chat(state, user, chat_id).await?;
    let messages = ChatMessages::find()
        .filter(MessageCol::ChatId.eq(chat.id))
        .order_by_asc(MessageCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(message_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Chat history",
        ChatThread {
            chat: chat_from_entity(chat),
            messages,
        },
        Some(Meta::empty()),
    ))
}

/// Gatekeeper for the live event stream of one thread.
pub async fn authorize_subscription(
    state: &AppState,
    user: &AuthUser,
    chat_id: Uuid,
) -> AppResult<()> {
    participant_chat(state, user, chat_id).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_participants_may_post() {
        let customer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        assert!(can_post(customer, seller, customer));
        assert!(can_post(customer, seller, seller));
        assert!(!can_post(customer, seller, Uuid::new_v4()));
    }

    #[test]
    fn blank_messages_are_rejected() {
        assert!(message_text("   ").is_err());
        assert_eq!(message_text("  fresh eggs? ").unwrap(), "fresh eggs?");
    }
}
