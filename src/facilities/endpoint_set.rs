use std::sync::Arc;

use dashmap::DashMap;

use crate::facilities::bot_endpoint::BotEndpoint;
use crate::models::BotEndpointConfig;
use crate::utils::{decode_base64_json, unique_id};

/// Registry of configured bot endpoints, looked up by id or by a
/// base64-encoded token that names an endpoint id.
pub struct EndpointSet {
    endpoints: DashMap<String, Arc<BotEndpoint>>,
    http: reqwest::Client,
}

impl EndpointSet {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            endpoints: DashMap::new(),
            http,
        }
    }

    /// Register an endpoint. The id defaults to the bot URL, then to a
    /// generated id.
    pub fn push(&self, id: Option<String>, config: &BotEndpointConfig) -> Arc<BotEndpoint> {
        let id = id
            .or_else(|| config.id.clone())
            .filter(|s| !s.is_empty())
            .or_else(|| Some(config.bot_url.clone()).filter(|s| !s.is_empty()))
            .unwrap_or_else(unique_id);

        let endpoint = Arc::new(BotEndpoint::new(id.clone(), config, self.http.clone()));
        self.endpoints.insert(id, endpoint.clone());
        endpoint
    }

    pub fn get(&self, id: &str) -> Option<Arc<BotEndpoint>> {
        if let Some(endpoint) = self.endpoints.get(id) {
            return Some(endpoint.value().clone());
        }

        // Tokens handed out by the Direct Line routes are base64 JSON blobs
        // carrying the endpoint id.
        let token = decode_base64_json(id)?;
        let endpoint_id = token.get("endpointId")?.as_str()?;
        self.endpoints
            .get(endpoint_id)
            .map(|entry| entry.value().clone())
    }

    pub fn get_by_app_id(&self, msa_app_id: &str) -> Option<Arc<BotEndpoint>> {
        self.endpoints
            .iter()
            .find(|entry| entry.value().msa_app_id.as_deref() == Some(msa_app_id))
            .map(|entry| entry.value().clone())
    }

    pub fn get_default(&self) -> Option<Arc<BotEndpoint>> {
        self.endpoints.iter().next().map(|entry| entry.value().clone())
    }

    pub fn get_all(&self) -> Vec<BotEndpointConfig> {
        self.endpoints
            .iter()
            .map(|entry| entry.value().to_config())
            .collect()
    }

    pub fn reset(&self) {
        self.endpoints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    fn config(bot_url: &str, app_id: Option<&str>) -> BotEndpointConfig {
        BotEndpointConfig {
            id: None,
            bot_id: Some("bot-1".into()),
            bot_url: bot_url.into(),
            msa_app_id: app_id.map(|s| s.to_string()),
            msa_password: app_id.map(|_| "secret".to_string()),
            use10_tokens: false,
        }
    }

    #[test]
    fn id_defaults_to_bot_url() {
        let set = EndpointSet::new(reqwest::Client::new());
        let endpoint = set.push(None, &config("http://localhost:3978/api/messages", None));
        assert_eq!(endpoint.id, "http://localhost:3978/api/messages");
        assert!(set.get("http://localhost:3978/api/messages").is_some());
    }

    #[test]
    fn resolves_base64_token_indirection() {
        let set = EndpointSet::new(reqwest::Client::new());
        set.push(Some("ep-1".into()), &config("http://localhost:3978", None));

        let token = STANDARD.encode(r#"{"endpointId":"ep-1"}"#);
        let hit = set.get(&token).expect("token should resolve");
        assert_eq!(hit.id, "ep-1");

        assert!(set.get("no-such-endpoint").is_none());
    }

    #[test]
    fn lookup_by_app_id_and_reset() {
        let set = EndpointSet::new(reqwest::Client::new());
        set.push(Some("ep-1".into()), &config("http://localhost:3978", Some("app-a")));
        set.push(Some("ep-2".into()), &config("http://localhost:3979", Some("app-b")));

        assert_eq!(set.get_by_app_id("app-b").unwrap().id, "ep-2");
        assert!(set.get_by_app_id("app-z").is_none());
        assert_eq!(set.get_all().len(), 2);

        set.reset();
        assert!(set.get_default().is_none());
        assert!(set.get_all().is_empty());
    }
}
