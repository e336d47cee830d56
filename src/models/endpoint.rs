use serde::{Deserialize, Serialize};

/// A configured remote bot address plus app credentials. This is both the
/// registration request body and the listing shape (the password is already
/// a secret the caller supplied, so it is echoed back the way the original
/// endpoint listing does).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotEndpointConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    pub bot_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msa_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msa_password: Option<String>,
    #[serde(default)]
    pub use10_tokens: bool,
}
