pub mod attachments;
pub mod botstate;
pub mod conversations;
pub mod directline;
pub mod emulator;
pub mod health;
pub mod usertoken;

#[cfg(test)]
mod api_tests;

use std::sync::Arc;

use actix_web::{web, HttpRequest};

use crate::facilities::{BotEndpoint, Conversation};
use crate::models::{ApiError, ErrorCode};
use crate::AppState;

/// Bearer token from the Authorization header, if any.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

/// Resolve the bot endpoint a request is speaking for. The bearer token is
/// an endpoint id (possibly wrapped in a base64 blob); requests without one
/// fall back to the default endpoint.
pub fn endpoint_from_request(
    state: &web::Data<AppState>,
    req: &HttpRequest,
) -> Option<Arc<BotEndpoint>> {
    match bearer_token(req) {
        Some(token) => state
            .facilities
            .endpoints
            .get(&token)
            .or_else(|| state.facilities.endpoints.get_default()),
        None => state.facilities.endpoints.get_default(),
    }
}

pub fn conversation_or_404(
    state: &web::Data<AppState>,
    conversation_id: &str,
) -> Result<Arc<Conversation>, ApiError> {
    state
        .facilities
        .conversations
        .conversation_by_id(conversation_id)
        .ok_or_else(|| ApiError::not_found(ErrorCode::BadArgument, "conversation not found"))
}
