pub mod events;
pub mod protocol;
pub mod server;

pub use events::EventBroadcaster;
pub use protocol::ConversationEvent;
pub use server::GatewayServer;
