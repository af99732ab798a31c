//! In-process fan-out of chat events to live subscribers.
//!
//! Each chat thread gets its own broadcast channel, created on first
//! subscribe. Delivery is at-most-once: a publish with no subscribers is
//! dropped, and a subscriber that lags more than the channel capacity loses
//! the oldest events.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ChatMessage;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    NewMessage { message: ChatMessage },
    MessageEdited { message: ChatMessage },
    MessageDeleted { chat_id: Uuid, message_id: Uuid },
}

#[derive(Clone, Default)]
pub struct ChatHub {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<ChatEvent>>>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, chat_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        let mut channels = self.lock();
        channels
            .entry(chat_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drops `receiver` and forgets the thread's channel once nobody listens.
    pub fn unsubscribe(&self, chat_id: Uuid, receiver: broadcast::Receiver<ChatEvent>) {
        let mut channels = self.lock();
        drop(receiver);
        if channels
            .get(&chat_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&chat_id);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.lock().len()
    }

    /// Returns how many subscribers the event was handed to.
    pub fn publish(&self, chat_id: Uuid, event: ChatEvent) -> usize {
        let mut channels = self.lock();
        let Some(sender) = channels.get(&chat_id) else {
            return 0;
        };
        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                // Every subscriber is gone.
                channels.remove(&chat_id);
                0
            }
        }
    }

    pub fn subscriber_count(&self, chat_id: Uuid) -> usize {
        self.lock()
            .get(&chat_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, broadcast::Sender<ChatEvent>>> {
        // A poisoned map only means a panic happened mid-insert; the map is still usable.
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(chat_id: Uuid, text: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            chat_id,
            sender_id: Uuid::new_v4(),
            text: text.into(),
            read: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_events_for_their_thread_only() {
        let hub = ChatHub::new();
        let chat_a = Uuid::new_v4();
        let chat_b = Uuid::new_v4();
        let mut rx_a = hub.subscribe(chat_a);
        let mut rx_b = hub.subscribe(chat_b);

        let msg = message(chat_a, "hello");
        let delivered = hub.publish(chat_a, ChatEvent::NewMessage { message: msg.clone() });
        assert_eq!(delivered, 1);

        assert_eq!(rx_a.recv().await.unwrap(), ChatEvent::NewMessage { message: msg });
        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = ChatHub::new();
        let chat = Uuid::new_v4();
        let mut rx = hub.subscribe(chat);

        let first = message(chat, "first");
        let second = message(chat, "second");
        hub.publish(chat, ChatEvent::NewMessage { message: first.clone() });
        hub.publish(chat, ChatEvent::MessageEdited { message: second.clone() });

        assert_eq!(rx.recv().await.unwrap(), ChatEvent::NewMessage { message: first });
        assert_eq!(rx.recv().await.unwrap(), ChatEvent::MessageEdited { message: second });
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let hub = ChatHub::new();
        let chat = Uuid::new_v4();
        assert_eq!(
            hub.publish(
                chat,
                ChatEvent::MessageDeleted {
                    chat_id: chat,
                    message_id: Uuid::new_v4()
                }
            ),
            0
        );
    }

    #[test]
    fn closed_channels_are_pruned() {
        let hub = ChatHub::new();
        let chat = Uuid::new_v4();
        let rx = hub.subscribe(chat);
        assert_eq!(hub.subscriber_count(chat), 1);
        drop(rx);

        let event = ChatEvent::MessageDeleted {
            chat_id: chat,
            message_id: Uuid::new_v4(),
        };
        assert_eq!(hub.publish(chat, event), 0);
        assert_eq!(hub.subscriber_count(chat), 0);
    }

    #[test]
    fn last_unsubscribe_forgets_the_thread() {
        let hub = ChatHub::new();
        let chat = Uuid::new_v4();
        let first = hub.subscribe(chat);
        let second = hub.subscribe(chat);
        assert_eq!(hub.channel_count(), 1);

        hub.unsubscribe(chat, first);
        assert_eq!(hub.subscriber_count(chat), 1);
        assert_eq!(hub.channel_count(), 1);

        hub.unsubscribe(chat, second);
        assert_eq!(hub.subscriber_count(chat), 0);
        assert_eq!(hub.channel_count(), 0);
    }
}
