use std::sync::Arc;

use dashmap::DashMap;

use crate::facilities::bot_endpoint::BotEndpoint;
use crate::facilities::conversation::Conversation;
use crate::facilities::logger::ConversationLogger;
use crate::facilities::token_cache::TokenCache;
use crate::gateway::EventBroadcaster;
use crate::models::ChannelAccount;
use crate::utils::unique_id;

/// Registry of live conversations.
pub struct ConversationSet {
    conversations: DashMap<String, Arc<Conversation>>,
    service_url: String,
    logger: Arc<ConversationLogger>,
    events: Arc<EventBroadcaster>,
    token_cache: Arc<TokenCache>,
    http: reqwest::Client,
}

impl ConversationSet {
    pub fn new(
        service_url: String,
        logger: Arc<ConversationLogger>,
        events: Arc<EventBroadcaster>,
        token_cache: Arc<TokenCache>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            conversations: DashMap::new(),
            service_url,
            logger,
            events,
            token_cache,
            http,
        }
    }

    pub fn new_conversation(
        &self,
        bot_endpoint: Option<Arc<BotEndpoint>>,
        user: ChannelAccount,
        conversation_id: Option<String>,
    ) -> Arc<Conversation> {
        let conversation_id = conversation_id.unwrap_or_else(unique_id);
        let conversation = Arc::new(Conversation::new(
            conversation_id.clone(),
            bot_endpoint,
            user,
            self.service_url.clone(),
            self.logger.clone(),
            self.events.clone(),
            self.token_cache.clone(),
            self.http.clone(),
        ));
        self.conversations
            .insert(conversation_id, conversation.clone());
        conversation
    }

    pub fn conversation_by_id(&self, id: &str) -> Option<Arc<Conversation>> {
        self.conversations.get(id).map(|entry| entry.value().clone())
    }

    pub fn delete_conversation(&self, id: &str) -> bool {
        self.conversations.remove(id).is_some()
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        self.conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
