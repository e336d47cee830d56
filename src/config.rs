use std::env;

use crate::models::BotEndpointConfig;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const GATEWAY_PORT: &str = "GATEWAY_PORT";
    /// Publicly reachable base URL handed to bots as the serviceUrl.
    /// Point this at a tunnel when talking to a remotely hosted bot.
    pub const SERVICE_URL: &str = "EMULATOR_SERVICE_URL";
    pub const USER_ID: &str = "EMULATOR_USER_ID";
    pub const USER_NAME: &str = "EMULATOR_USER_NAME";
    // Optional seed endpoint registered at startup
    pub const BOT_URL: &str = "BOT_URL";
    pub const BOT_ID: &str = "BOT_ID";
    pub const MSA_APP_ID: &str = "MSA_APP_ID";
    pub const MSA_PASSWORD: &str = "MSA_PASSWORD";
    pub const USE_10_TOKENS: &str = "USE_10_TOKENS";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 9001;
    pub const GATEWAY_PORT: u16 = 9002;
    pub const USER_ID: &str = "default-user";
    pub const USER_NAME: &str = "User";
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub gateway_port: u16,
    pub service_url: Option<String>,
    pub user_id: String,
    pub user_name: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var(env_vars::PORT)
                .unwrap_or_else(|_| defaults::PORT.to_string())
                .parse()
                .expect("PORT must be a valid number"),
            gateway_port: env::var(env_vars::GATEWAY_PORT)
                .unwrap_or_else(|_| defaults::GATEWAY_PORT.to_string())
                .parse()
                .expect("GATEWAY_PORT must be a valid number"),
            service_url: env::var(env_vars::SERVICE_URL).ok(),
            user_id: env::var(env_vars::USER_ID).unwrap_or_else(|_| defaults::USER_ID.to_string()),
            user_name: env::var(env_vars::USER_NAME)
                .unwrap_or_else(|_| defaults::USER_NAME.to_string()),
        }
    }

    /// The callback URL advertised to bots. Falls back to the local listener
    /// when no tunnel/override is configured.
    pub fn service_url(&self) -> String {
        self.service_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    /// Seed endpoint from the environment, if one is configured.
    pub fn seed_endpoint(&self) -> Option<BotEndpointConfig> {
        let bot_url = env::var(env_vars::BOT_URL).ok()?;
        Some(BotEndpointConfig {
            id: None,
            bot_id: env::var(env_vars::BOT_ID).ok(),
            bot_url,
            msa_app_id: env::var(env_vars::MSA_APP_ID).ok(),
            msa_password: env::var(env_vars::MSA_PASSWORD).ok(),
            use10_tokens: env::var(env_vars::USE_10_TOKENS)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}
