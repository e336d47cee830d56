use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::controllers::{conversation_or_404, endpoint_from_request};
use crate::models::{
    Activity, ApiError, AttachmentData, ConversationParameters, ConversationResourceResponse,
    ErrorCode, ResourceResponse,
};
use crate::AppState;

/// Bot-initiated conversation creation.
async fn create_conversation(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ConversationParameters>,
) -> impl Responder {
    let endpoint = match endpoint_from_request(&data, &req) {
        Some(endpoint) => endpoint,
        None => {
            return ApiError::new(
                actix_web::http::StatusCode::UNAUTHORIZED,
                ErrorCode::ServiceError,
                "no bot endpoint is configured",
            )
            .response();
        }
    };
    let params = body.into_inner();

    let non_bot_members: Vec<_> = params
        .members
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|m| m.role.as_deref() != Some("bot") && m.id != endpoint.bot_id)
        .collect();
    if non_bot_members.len() > 1 {
        return ApiError::bad_request(
            ErrorCode::BadSyntax,
            "the emulator only supports conversations with one user",
        )
        .response();
    }

    let user = non_bot_members
        .into_iter()
        .next()
        .unwrap_or_else(|| data.facilities.users.current_user());

    let conversation = match params
        .conversation_id
        .as_deref()
        .and_then(|id| data.facilities.conversations.conversation_by_id(id))
    {
        Some(existing) => existing,
        None => data.facilities.conversations.new_conversation(
            Some(endpoint),
            user,
            params.conversation_id.clone(),
        ),
    };

    let activity_id = params
        .activity
        .map(|activity| conversation.post_activity_to_user(activity).id);

    HttpResponse::Created().json(ConversationResourceResponse {
        id: conversation.conversation_id.clone(),
        activity_id,
        service_url: data.facilities.service_url.clone(),
    })
}

/// Bot pushes an activity into the conversation for the user to poll.
async fn send_to_conversation(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Activity>,
) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    let mut activity = body.into_inner();
    // The channel owns the id; whatever the bot sent is ignored
    activity.id = None;
    activity.reply_to_id = None;

    let response = conversation.post_activity_to_user(activity);
    HttpResponse::Ok().json(response)
}

async fn reply_to_activity(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<Activity>,
) -> impl Responder {
    let (conversation_id, activity_id) = path.into_inner();
    let conversation = match conversation_or_404(&data, &conversation_id) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    let mut activity = body.into_inner();
    activity.id = None;
    activity.reply_to_id = Some(activity_id);

    let response = conversation.post_activity_to_user(activity);
    HttpResponse::Ok().json(response)
}

async fn update_activity(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<Activity>,
) -> impl Responder {
    let (conversation_id, activity_id) = path.into_inner();
    let conversation = match conversation_or_404(&data, &conversation_id) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    let mut activity = body.into_inner();
    activity.id = Some(activity_id);

    match conversation.update_activity(activity) {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => e.response(),
    }
}

async fn delete_activity(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (conversation_id, activity_id) = path.into_inner();
    let conversation = match conversation_or_404(&data, &conversation_id) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    match conversation.delete_activity(&activity_id) {
        Ok(()) => HttpResponse::Ok().json(ResourceResponse::new(activity_id)),
        Err(e) => e.response(),
    }
}

async fn get_conversation_members(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match conversation_or_404(&data, &path) {
        Ok(conversation) => HttpResponse::Ok().json(conversation.members()),
        Err(e) => e.response(),
    }
}

async fn get_activity_members(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (conversation_id, _activity_id) = path.into_inner();
    match conversation_or_404(&data, &conversation_id) {
        Ok(conversation) => HttpResponse::Ok().json(conversation.members()),
        Err(e) => e.response(),
    }
}

async fn upload_attachment(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<AttachmentData>,
) -> impl Responder {
    if let Err(e) = conversation_or_404(&data, &path) {
        return e.response();
    }

    match data.facilities.attachments.upload(body.into_inner()) {
        Ok(id) => HttpResponse::Ok().json(ResourceResponse::new(id)),
        Err(e) => e.response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v3/conversations")
            .route("", web::post().to(create_conversation))
            .route(
                "/{conversation_id}/activities",
                web::post().to(send_to_conversation),
            )
            .route(
                "/{conversation_id}/activities/{activity_id}",
                web::post().to(reply_to_activity),
            )
            .route(
                "/{conversation_id}/activities/{activity_id}",
                web::put().to(update_activity),
            )
            .route(
                "/{conversation_id}/activities/{activity_id}",
                web::delete().to(delete_activity),
            )
            .route(
                "/{conversation_id}/members",
                web::get().to(get_conversation_members),
            )
            .route(
                "/{conversation_id}/activities/{activity_id}/members",
                web::get().to(get_activity_members),
            )
            .route(
                "/{conversation_id}/attachments",
                web::post().to(upload_attachment),
            ),
    );
}
