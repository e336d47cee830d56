use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::{ApiError, BotEndpointConfig};

const TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";
const TOKEN_SCOPE: &str = "https://api.botframework.com/.default";
/// Refresh this long before the token actually expires.
const EXPIRY_SLACK_SECS: i64 = 300;

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// A configured remote bot address plus the credentials used to call it.
pub struct BotEndpoint {
    pub id: String,
    pub bot_id: String,
    pub bot_url: String,
    pub msa_app_id: Option<String>,
    pub msa_password: Option<String>,
    pub use_10_tokens: bool,
    access_token: Mutex<Option<CachedToken>>,
    http: reqwest::Client,
}

impl BotEndpoint {
    pub fn new(id: String, config: &BotEndpointConfig, http: reqwest::Client) -> Self {
        Self {
            id,
            bot_id: config.bot_id.clone().unwrap_or_else(|| "bot-1".to_string()),
            bot_url: config.bot_url.clone(),
            msa_app_id: config.msa_app_id.clone().filter(|s| !s.is_empty()),
            msa_password: config.msa_password.clone().filter(|s| !s.is_empty()),
            use_10_tokens: config.use10_tokens,
            access_token: Mutex::new(None),
            http,
        }
    }

    pub fn to_config(&self) -> BotEndpointConfig {
        BotEndpointConfig {
            id: Some(self.id.clone()),
            bot_id: Some(self.bot_id.clone()),
            bot_url: self.bot_url.clone(),
            msa_app_id: self.msa_app_id.clone(),
            msa_password: self.msa_password.clone(),
            use10_tokens: self.use_10_tokens,
        }
    }

    fn has_credentials(&self) -> bool {
        self.msa_app_id.is_some() && self.msa_password.is_some()
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.access_token.lock();
        guard.as_ref().and_then(|cached| {
            if cached.expires_at > Utc::now() {
                Some(cached.token.clone())
            } else {
                None
            }
        })
    }

    /// Client-credentials token for the connector. Cached until shortly
    /// before expiry; `force` drops the cache first (401 retry path).
    async fn get_access_token(&self, force: bool) -> Result<Option<String>, ApiError> {
        let (app_id, password) = match (&self.msa_app_id, &self.msa_password) {
            (Some(app_id), Some(password)) => (app_id.clone(), password.clone()),
            _ => return Ok(None),
        };

        if !force {
            if let Some(token) = self.cached_token() {
                return Ok(Some(token));
            }
        }

        // v1.0-style tokens are scoped to the app itself
        let scope = if self.use_10_tokens {
            format!("{}/.default", app_id)
        } else {
            TOKEN_SCOPE.to_string()
        };

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", app_id.as_str()),
            ("client_secret", password.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::service_error(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::service_error(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::service_error(format!("malformed token response: {}", e)))?;

        let expires_at =
            Utc::now() + Duration::seconds((token.expires_in - EXPIRY_SLACK_SECS).max(60));
        *self.access_token.lock() = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at,
        });

        Ok(Some(token.access_token))
    }

    /// POST a JSON body to the bot, attaching connector auth when the
    /// endpoint has credentials. Retries once with a fresh token on 401/403.
    pub async fn fetch_with_auth<T: Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(u16, String), ApiError> {
        let token = self.get_access_token(false).await?;
        let (status, text) = self.post_json(url, body, token.as_deref()).await?;

        if (status == 401 || status == 403) && self.has_credentials() {
            log::debug!("Bot returned {}, refreshing connector token", status);
            let token = self.get_access_token(true).await?;
            return self.post_json(url, body, token.as_deref()).await;
        }

        Ok((status, text))
    }

    async fn post_json<T: Serialize>(
        &self,
        url: &str,
        body: &T,
        token: Option<&str>,
    ) -> Result<(u16, String), ApiError> {
        let mut request = self.http.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::service_error(format!("cannot reach bot endpoint: {}", e)))?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Ok((status, text))
    }
}
