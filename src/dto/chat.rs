use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Chat, ChatMessage};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChatRequest {
    pub farm_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub chat_id: Uuid,
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditMessageRequest {
    pub chat_id: Uuid,
    pub message_id: Uuid,
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteMessageRequest {
    pub chat_id: Uuid,
    pub message_id: Uuid,
}

/// List view: a thread with only its most recent message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatSummary {
    pub chat: Chat,
    pub last_message: Option<ChatMessage>,
    pub unread: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatList {
    pub items: Vec<ChatSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatThread {
    pub chat: Chat,
    pub messages: Vec<ChatMessage>,
}
