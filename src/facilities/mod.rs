pub mod attachments;
pub mod bot_endpoint;
pub mod bot_state;
pub mod conversation;
pub mod conversation_set;
pub mod endpoint_set;
pub mod logger;
pub mod token_cache;
pub mod users;


pub use attachments::AttachmentStore;
pub use bot_endpoint::BotEndpoint;
pub use bot_state::{BotData, BotStateError, BotStateStore};
pub use conversation::{Conversation, PostedActivity, TranscriptRecordKind};
pub use conversation_set::ConversationSet;
pub use endpoint_set::EndpointSet;
pub use logger::ConversationLogger;
pub use token_cache::TokenCache;
pub use users::UserRegistry;

use std::sync::Arc;

use crate::config::Config;
use crate::gateway::EventBroadcaster;
use crate::models::ChannelAccount;

/// Shared emulator state: every registry the HTTP surface operates on.
pub struct Facilities {
    pub endpoints: EndpointSet,
    pub conversations: ConversationSet,
    pub users: UserRegistry,
    pub attachments: AttachmentStore,
    pub bot_state: BotStateStore,
    pub token_cache: Arc<TokenCache>,
    pub logger: Arc<ConversationLogger>,
    pub events: Arc<EventBroadcaster>,
    pub service_url: String,
}

impl Facilities {
    pub fn new(config: &Config, events: Arc<EventBroadcaster>) -> Self {
        let http = reqwest::Client::new();
        let service_url = config.service_url();
        let logger = Arc::new(ConversationLogger::new(events.clone()));
        let token_cache = Arc::new(TokenCache::new());

        Self {
            endpoints: EndpointSet::new(http.clone()),
            conversations: ConversationSet::new(
                service_url.clone(),
                logger.clone(),
                events.clone(),
                token_cache.clone(),
                http,
            ),
            users: UserRegistry::new(ChannelAccount::new(
                config.user_id.clone(),
                config.user_name.clone(),
            )),
            attachments: AttachmentStore::new(),
            bot_state: BotStateStore::new(),
            token_cache,
            logger,
            events,
            service_url,
        }
    }
}
