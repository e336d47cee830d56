use std::sync::Arc;

use crate::gateway::{ConversationEvent, EventBroadcaster};
use crate::models::{Activity, LogItem, LogLevel};

/// Per-conversation structured logging. Every item is both mirrored to the
/// process log and streamed to gateway clients for the inspector panel.
pub struct ConversationLogger {
    events: Arc<EventBroadcaster>,
}

impl ConversationLogger {
    pub fn new(events: Arc<EventBroadcaster>) -> Self {
        Self { events }
    }

    pub fn log_message(&self, conversation_id: &str, item: LogItem) {
        match &item {
            LogItem::Text { level, text } => match level {
                LogLevel::Debug => log::debug!("[{}] {}", conversation_id, text),
                LogLevel::Info => log::info!("[{}] {}", conversation_id, text),
                LogLevel::Warn => log::warn!("[{}] {}", conversation_id, text),
                LogLevel::Error => log::error!("[{}] {}", conversation_id, text),
            },
            other => log::debug!("[{}] {:?}", conversation_id, other),
        }
        self.events
            .broadcast(ConversationEvent::log_item(conversation_id, &item));
    }

    pub fn log_activity(&self, conversation_id: &str, activity: &Activity, role: &str) {
        log::debug!(
            "[{}] -> {} activity \"{}\"",
            conversation_id,
            role,
            activity.activity_type
        );
        let obj = serde_json::to_value(activity).unwrap_or(serde_json::Value::Null);
        self.events.broadcast(ConversationEvent::log_item(
            conversation_id,
            &LogItem::InspectableObject {
                text: format!("{} activity", activity.activity_type),
                obj,
            },
        ));
    }

    pub fn log_exception(&self, conversation_id: &str, err: &dyn std::fmt::Display) {
        log::error!("[{}] {}", conversation_id, err);
        self.events.broadcast(ConversationEvent::log_item(
            conversation_id,
            &LogItem::Exception {
                err: err.to_string(),
            },
        ));
    }
}
