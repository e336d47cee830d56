use dashmap::DashMap;

use crate::models::TokenResponse;

/// OAuth tokens handed to the emulator on behalf of a signed-in user, keyed
/// by bot, user and connection so `GetToken` can replay them to the bot.
pub struct TokenCache {
    tokens: DashMap<String, String>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    fn key(bot_id: &str, user_id: &str, connection_name: &str) -> String {
        format!("{}|{}|{}", bot_id, user_id, connection_name)
    }

    pub fn add_token(&self, bot_id: &str, user_id: &str, connection_name: &str, token: &str) {
        self.tokens.insert(
            Self::key(bot_id, user_id, connection_name),
            token.to_string(),
        );
    }

    pub fn get_token(
        &self,
        bot_id: &str,
        user_id: &str,
        connection_name: &str,
    ) -> Option<TokenResponse> {
        self.tokens
            .get(&Self::key(bot_id, user_id, connection_name))
            .map(|entry| TokenResponse {
                connection_name: connection_name.to_string(),
                token: entry.value().clone(),
            })
    }

    pub fn delete_token(&self, bot_id: &str, user_id: &str, connection_name: &str) -> bool {
        self.tokens
            .remove(&Self::key(bot_id, user_id, connection_name))
            .is_some()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_scoped_to_bot_user_and_connection() {
        let cache = TokenCache::new();
        cache.add_token("bot-1", "user-1", "github", "tok-a");

        let hit = cache.get_token("bot-1", "user-1", "github").unwrap();
        assert_eq!(hit.token, "tok-a");
        assert_eq!(hit.connection_name, "github");

        assert!(cache.get_token("bot-2", "user-1", "github").is_none());
        assert!(cache.get_token("bot-1", "user-1", "graph").is_none());

        assert!(cache.delete_token("bot-1", "user-1", "github"));
        assert!(!cache.delete_token("bot-1", "user-1", "github"));
    }
}
