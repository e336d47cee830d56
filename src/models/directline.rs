use serde::{Deserialize, Serialize};

use crate::models::Activity;

/// Response to Direct Line start/reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectLineConversation {
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    // Direct Line keeps this one snake_case on the wire
    #[serde(rename = "expires_in")]
    pub expires_in: i32,
    pub stream_url: String,
}

/// Watermark-tagged activity page returned from the polling route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySet {
    pub activities: Vec<Activity>,
    /// Pass this back on the next poll to fetch only newer activities.
    pub watermark: u64,
}
