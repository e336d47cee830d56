use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Attachment;

/// A user or bot participating in a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            role: None,
        }
    }
}

/// Reference to the conversation an activity belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A single message/event exchanged between bot and user, modeled on the
/// Bot Framework activity schema. Fields the emulator never inspects are
/// preserved verbatim in `extra` so relayed activities round-trip losslessly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub activity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speak: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members_added: Option<Vec<ChannelAccount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members_removed: Option<Vec<ChannelAccount>>,
    /// "add" / "remove" on contactRelationUpdate activities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    pub fn of_type(activity_type: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
            ..Default::default()
        }
    }

    /// Overlay the fields present on `update` onto this activity. Mirrors a
    /// JSON object spread: only keys the caller actually sent win.
    pub fn merge(&mut self, update: &Activity) {
        let mut base = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Ok(Value::Object(overlay)) = serde_json::to_value(update) {
            for (key, value) in overlay {
                base.insert(key, value);
            }
        }
        if let Ok(merged) = serde_json::from_value(Value::Object(base)) {
            *self = merged;
        }
    }
}

/// Body of `POST /v3/conversations`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParameters {
    #[serde(default)]
    pub is_group: Option<bool>,
    #[serde(default)]
    pub bot: Option<ChannelAccount>,
    #[serde(default)]
    pub members: Option<Vec<ChannelAccount>>,
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default)]
    pub activity: Option<Activity>,
    #[serde(default)]
    pub channel_data: Option<Value>,
    /// Emulator extension: pin the new conversation to a specific id.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResourceResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    pub service_url: String,
}

/// Standard `{ "id": ... }` acknowledgment for activity operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub id: String,
}

impl ResourceResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_round_trips_unknown_fields() {
        let raw = json!({
            "type": "message",
            "text": "hi",
            "textFormat": "plain",
            "customVendorField": { "nested": true }
        });

        let activity: Activity = serde_json::from_value(raw).unwrap();
        assert_eq!(activity.activity_type, "message");
        assert_eq!(activity.text_format.as_deref(), Some("plain"));

        let out = serde_json::to_value(&activity).unwrap();
        assert_eq!(out["customVendorField"]["nested"], json!(true));
        // None fields stay off the wire
        assert!(out.get("replyToId").is_none());
    }

    #[test]
    fn merge_overlays_only_supplied_fields() {
        let mut activity = Activity::of_type("message");
        activity.id = Some("42".into());
        activity.text = Some("original".into());
        activity.locale = Some("en-US".into());

        let mut update = Activity::of_type("message");
        update.id = Some("42".into());
        update.text = Some("edited".into());

        activity.merge(&update);
        assert_eq!(activity.text.as_deref(), Some("edited"));
        assert_eq!(activity.locale.as_deref(), Some("en-US"));
        assert_eq!(activity.id.as_deref(), Some("42"));
    }
}
