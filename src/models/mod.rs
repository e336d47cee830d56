pub mod activity;
pub mod attachment;
pub mod directline;
pub mod endpoint;
pub mod error;
pub mod log;
pub mod token;

pub use activity::{
    Activity, ChannelAccount, ConversationAccount, ConversationParameters,
    ConversationResourceResponse, ResourceResponse,
};
pub use attachment::{Attachment, AttachmentData, AttachmentInfo, AttachmentView};
pub use directline::{ActivitySet, DirectLineConversation};
pub use endpoint::BotEndpointConfig;
pub use error::{ApiError, ErrorCode, ErrorResponse};
pub use log::{LogItem, LogLevel};
pub use token::{TokenParams, TokenResponse};
