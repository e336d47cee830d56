use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};

use crate::facilities::bot_state::{BotData, BotStateError};
use crate::models::{ApiError, ErrorCode, LogItem, LogLevel};
use crate::AppState;

const DEPRECATION_WARNING: &str =
    "Warning: The bot state API is deprecated and will be removed in a future version. \
     Bots should use their own storage for state.";

/// Log the deprecation warning the first time a conversation touches the
/// state API.
fn warn_deprecated(data: &web::Data<AppState>, conversation_id: &str) {
    let Some(conversation) = data
        .facilities
        .conversations
        .conversation_by_id(conversation_id)
    else {
        return;
    };
    if conversation.state_api_warning_needed() {
        data.facilities.logger.log_message(
            conversation_id,
            LogItem::text(LogLevel::Warn, DEPRECATION_WARNING),
        );
    }
}

fn set_response(result: Result<BotData, BotStateError>) -> HttpResponse {
    match result {
        Ok(saved) => HttpResponse::Ok().json(saved),
        Err(BotStateError::PreconditionFailed) => ApiError::new(
            StatusCode::PRECONDITION_FAILED,
            ErrorCode::BadArgument,
            "the data has changed since it was read",
        )
        .response(),
    }
}

async fn get_user_data(data: web::Data<AppState>, path: web::Path<(String, String)>) -> impl Responder {
    let (channel_id, user_id) = path.into_inner();
    HttpResponse::Ok().json(data.facilities.bot_state.get(&channel_id, None, Some(&user_id)))
}

async fn set_user_data(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<BotData>,
) -> impl Responder {
    let (channel_id, user_id) = path.into_inner();
    set_response(
        data.facilities
            .bot_state
            .set(&channel_id, None, Some(&user_id), body.into_inner()),
    )
}

async fn get_conversation_data(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (channel_id, conversation_id) = path.into_inner();
    HttpResponse::Ok().json(
        data.facilities
            .bot_state
            .get(&channel_id, Some(&conversation_id), None),
    )
}

async fn set_conversation_data(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<BotData>,
) -> impl Responder {
    let (channel_id, conversation_id) = path.into_inner();
    warn_deprecated(&data, &conversation_id);
    set_response(data.facilities.bot_state.set(
        &channel_id,
        Some(&conversation_id),
        None,
        body.into_inner(),
    ))
}

async fn get_private_conversation_data(
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> impl Responder {
    let (channel_id, conversation_id, user_id) = path.into_inner();
    HttpResponse::Ok().json(data.facilities.bot_state.get(
        &channel_id,
        Some(&conversation_id),
        Some(&user_id),
    ))
}

async fn set_private_conversation_data(
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    body: web::Json<BotData>,
) -> impl Responder {
    let (channel_id, conversation_id, user_id) = path.into_inner();
    warn_deprecated(&data, &conversation_id);
    set_response(data.facilities.bot_state.set(
        &channel_id,
        Some(&conversation_id),
        Some(&user_id),
        body.into_inner(),
    ))
}

async fn delete_state_for_user(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (channel_id, user_id) = path.into_inner();
    let deleted = data.facilities.bot_state.delete_user_data(&channel_id, &user_id);
    HttpResponse::Ok().json(deleted)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v3/botstate")
            .route("/{channel_id}/users/{user_id}", web::get().to(get_user_data))
            .route("/{channel_id}/users/{user_id}", web::post().to(set_user_data))
            .route(
                "/{channel_id}/users/{user_id}",
                web::delete().to(delete_state_for_user),
            )
            .route(
                "/{channel_id}/conversations/{conversation_id}",
                web::get().to(get_conversation_data),
            )
            .route(
                "/{channel_id}/conversations/{conversation_id}",
                web::post().to(set_conversation_data),
            )
            .route(
                "/{channel_id}/conversations/{conversation_id}/users/{user_id}",
                web::get().to(get_private_conversation_data),
            )
            .route(
                "/{channel_id}/conversations/{conversation_id}/users/{user_id}",
                web::post().to(set_private_conversation_data),
            ),
    );
}
