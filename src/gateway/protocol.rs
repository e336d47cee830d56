use serde::Serialize;
use serde_json::Value;

use crate::models::{Activity, ChannelAccount, LogItem};

/// Event types for gateway broadcasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ActivityAdded,
    ActivityUpdated,
    ActivityDeleted,
    MemberJoined,
    MemberLeft,
    TranscriptUpdate,
    ConversationEnded,
    LogItemAdded,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActivityAdded => "conversation.activity_added",
            Self::ActivityUpdated => "conversation.activity_updated",
            Self::ActivityDeleted => "conversation.activity_deleted",
            Self::MemberJoined => "conversation.member_joined",
            Self::MemberLeft => "conversation.member_left",
            Self::TranscriptUpdate => "conversation.transcript_update",
            Self::ConversationEnded => "conversation.ended",
            Self::LogItemAdded => "log.item",
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

/// Event pushed to every connected gateway client.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEvent {
    #[serde(rename = "type")]
    pub type_: String,
    pub event: String,
    pub conversation_id: String,
    pub data: Value,
}

impl ConversationEvent {
    pub fn new(event: impl Into<String>, conversation_id: &str, data: Value) -> Self {
        Self {
            type_: "event".to_string(),
            event: event.into(),
            conversation_id: conversation_id.to_string(),
            data,
        }
    }

    pub fn activity_added(conversation_id: &str, activity: &Activity) -> Self {
        Self::new(
            EventType::ActivityAdded,
            conversation_id,
            serde_json::json!({ "activity": activity }),
        )
    }

    pub fn activity_updated(conversation_id: &str, activity: &Activity) -> Self {
        Self::new(
            EventType::ActivityUpdated,
            conversation_id,
            serde_json::json!({ "activity": activity }),
        )
    }

    pub fn activity_deleted(conversation_id: &str, activity_id: &str) -> Self {
        Self::new(
            EventType::ActivityDeleted,
            conversation_id,
            serde_json::json!({ "id": activity_id }),
        )
    }

    pub fn member_joined(conversation_id: &str, member: &ChannelAccount) -> Self {
        Self::new(
            EventType::MemberJoined,
            conversation_id,
            serde_json::json!({ "user": member }),
        )
    }

    pub fn member_left(conversation_id: &str, member: &ChannelAccount) -> Self {
        Self::new(
            EventType::MemberLeft,
            conversation_id,
            serde_json::json!({ "user": member }),
        )
    }

    pub fn transcript_update(conversation_id: &str) -> Self {
        Self::new(EventType::TranscriptUpdate, conversation_id, Value::Null)
    }

    pub fn conversation_ended(conversation_id: &str) -> Self {
        Self::new(EventType::ConversationEnded, conversation_id, Value::Null)
    }

    pub fn log_item(conversation_id: &str, item: &LogItem) -> Self {
        Self::new(
            EventType::LogItemAdded,
            conversation_id,
            serde_json::to_value(item).unwrap_or(Value::Null),
        )
    }
}
