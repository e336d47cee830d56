use serde::{Deserialize, Serialize};

/// Query parameters shared by the user-token routes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenParams {
    pub user_id: String,
    pub connection_name: String,
    /// Magic-code sign-in flows send this; the lookup resolves from the
    /// cache either way, so it is accepted and ignored.
    #[serde(default)]
    pub code: Option<String>,
}

/// Cached OAuth token handed back to the bot on `GetToken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub connection_name: String,
    pub token: String,
}
