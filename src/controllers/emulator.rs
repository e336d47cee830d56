use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::controllers::conversation_or_404;
use crate::models::{Activity, BotEndpointConfig, ChannelAccount, LogItem};
use crate::AppState;

/// Add one conversation member per entry; entries without an id get one
/// generated.
async fn add_users(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Vec<ChannelAccount>>,
) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    let mut added = Vec::new();
    for member in body.into_inner() {
        let id = Some(member.id).filter(|s| !s.is_empty());
        added.push(conversation.add_member(id, member.name).await);
    }
    HttpResponse::Ok().json(added)
}

async fn get_users(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match conversation_or_404(&data, &path) {
        Ok(conversation) => HttpResponse::Ok().json(conversation.members()),
        Err(e) => e.response(),
    }
}

#[derive(Deserialize)]
struct RemoveUsersQuery {
    id: Option<String>,
}

/// Remove the named member, or the conversation's own user when no id is
/// given.
async fn remove_users(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RemoveUsersQuery>,
) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    let id = query
        .id
        .clone()
        .unwrap_or_else(|| conversation.user.id.clone());
    conversation.remove_member(&id).await;
    HttpResponse::Ok().finish()
}

async fn contact_added(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };
    conversation.send_contact_added().await;
    HttpResponse::Ok().finish()
}

async fn contact_removed(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };
    conversation.send_contact_removed().await;
    HttpResponse::Ok().finish()
}

async fn typing(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };
    conversation.send_typing().await;
    HttpResponse::Ok().finish()
}

async fn ping(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };
    conversation.send_ping().await;
    HttpResponse::Ok().finish()
}

async fn delete_user_data(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };
    conversation.send_delete_user_data().await;
    HttpResponse::Ok().finish()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponseBody {
    connection_name: String,
    token: String,
    #[serde(default)]
    do_not_cache: bool,
}

/// Forward a signed-in user's OAuth token to the bot.
async fn send_token_response(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<TokenResponseBody>,
) -> impl Responder {
    let conversation_id = path.into_inner();
    let conversation = match conversation_or_404(&data, &conversation_id) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    let body = body.into_inner();
    match conversation
        .send_token_response(&body.connection_name, &body.token, body.do_not_cache)
        .await
    {
        Ok(posted) => HttpResponse::build(
            actix_web::http::StatusCode::from_u16(posted.status)
                .unwrap_or(actix_web::http::StatusCode::OK),
        )
        .finish(),
        Err(e) => {
            data.facilities.logger.log_exception(&conversation_id, &e);
            e.response()
        }
    }
}

async fn get_transcript(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };
    HttpResponse::Ok().json(conversation.get_transcript().await)
}

/// Load a saved transcript into a conversation, creating the conversation
/// when it does not exist yet.
async fn feed_transcript(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Vec<Activity>>,
) -> impl Responder {
    let conversation_id = path.into_inner();

    let conversation = match data
        .facilities
        .conversations
        .conversation_by_id(&conversation_id)
    {
        Some(existing) => existing,
        None => {
            let endpoint = data.facilities.endpoints.get_default();
            let user = data.facilities.users.current_user();
            data.facilities.conversations.new_conversation(
                endpoint,
                user,
                Some(conversation_id.clone()),
            )
        }
    };

    conversation.feed_activities(body.into_inner());
    HttpResponse::Ok().finish()
}

async fn end_conversation(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation_id = path.into_inner();
    if data
        .facilities
        .conversations
        .delete_conversation(&conversation_id)
    {
        data.facilities.logger.log_message(
            &conversation_id,
            LogItem::text(crate::models::LogLevel::Info, "Conversation ended."),
        );
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::NotFound().finish()
    }
}

async fn get_endpoints(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.facilities.endpoints.get_all())
}

async fn add_endpoint(
    data: web::Data<AppState>,
    body: web::Json<BotEndpointConfig>,
) -> impl Responder {
    let endpoint = data.facilities.endpoints.push(None, &body.into_inner());
    HttpResponse::Created().json(endpoint.to_config())
}

async fn reset_endpoints(data: web::Data<AppState>) -> impl Responder {
    data.facilities.endpoints.reset();
    HttpResponse::Ok().finish()
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/emulator")
            .route("/endpoints", web::get().to(get_endpoints))
            .route("/endpoints", web::post().to(add_endpoint))
            .route("/endpoints", web::delete().to(reset_endpoints))
            .route("/{conversation_id}/users", web::get().to(get_users))
            .route("/{conversation_id}/users", web::post().to(add_users))
            .route("/{conversation_id}/users", web::delete().to(remove_users))
            .route("/{conversation_id}/contacts", web::post().to(contact_added))
            .route(
                "/{conversation_id}/contacts",
                web::delete().to(contact_removed),
            )
            .route("/{conversation_id}/typing", web::post().to(typing))
            .route("/{conversation_id}/ping", web::post().to(ping))
            .route(
                "/{conversation_id}/userdata",
                web::delete().to(delete_user_data),
            )
            .route(
                "/{conversation_id}/token",
                web::post().to(send_token_response),
            )
            .route(
                "/{conversation_id}/transcript",
                web::get().to(get_transcript),
            )
            .route(
                "/{conversation_id}/transcript",
                web::post().to(feed_transcript),
            )
            .route("/{conversation_id}", web::delete().to(end_conversation)),
    );
}
