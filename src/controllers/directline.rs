use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures_util::StreamExt as _;
use serde::Deserialize;

use crate::controllers::{bearer_token, conversation_or_404, endpoint_from_request};
use crate::facilities::PostedActivity;
use crate::models::{
    Activity, ActivitySet, ApiError, Attachment, AttachmentData, DirectLineConversation,
    ErrorCode, LogItem, ResourceResponse,
};
use crate::utils::{decode_base64_json, unique_id};
use crate::AppState;

fn direct_line_response(
    conversation_id: String,
    token: Option<String>,
) -> DirectLineConversation {
    DirectLineConversation {
        conversation_id,
        token,
        expires_in: i32::MAX,
        stream_url: String::new(),
    }
}

/// Start (or reconnect to) a Direct Line conversation. The bearer token is
/// either an endpoint id or a base64 blob naming the conversation to resume.
async fn start_conversation(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let token = bearer_token(&req);
    let endpoint = endpoint_from_request(&data, &req);

    let conversation_id = token
        .as_deref()
        .and_then(decode_base64_json)
        .and_then(|value| {
            value
                .get("conversationId")
                .and_then(|id| id.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(unique_id);

    let current_user = data.facilities.users.current_user();

    let (conversation, created) = match data
        .facilities
        .conversations
        .conversation_by_id(&conversation_id)
    {
        Some(existing) => {
            // Reconnect: re-add anyone who left in the meantime
            if let Some(endpoint) = &endpoint {
                if !existing.has_member(&endpoint.bot_id) {
                    existing
                        .add_member(Some(endpoint.bot_id.clone()), Some("Bot".to_string()))
                        .await;
                }
            }
            if !existing.has_member(&current_user.id) {
                existing
                    .add_member(Some(current_user.id.clone()), current_user.name.clone())
                    .await;
            }
            (existing, false)
        }
        None => {
            let conversation = data.facilities.conversations.new_conversation(
                endpoint.clone(),
                current_user.clone(),
                Some(conversation_id),
            );
            if let Some(endpoint) = &endpoint {
                let bot = crate::models::ChannelAccount::new(endpoint.bot_id.clone(), "Bot");
                conversation
                    .send_conversation_update(Some(vec![bot]), None)
                    .await;
            }
            conversation
                .send_conversation_update(Some(vec![current_user]), None)
                .await;
            (conversation, true)
        }
    };

    let body = direct_line_response(
        conversation.conversation_id.clone(),
        endpoint.map(|e| e.id.clone()),
    );

    if created {
        HttpResponse::Created().json(body)
    } else {
        HttpResponse::Ok().json(body)
    }
}

async fn reconnect_to_conversation(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    match conversation_or_404(&data, &path) {
        Ok(conversation) => {
            let endpoint = endpoint_from_request(&data, &req);
            HttpResponse::Ok().json(direct_line_response(
                conversation.conversation_id.clone(),
                endpoint.map(|e| e.id.clone()),
            ))
        }
        Err(e) => e.response(),
    }
}

#[derive(Deserialize)]
struct ActivitiesQuery {
    watermark: Option<String>,
}

/// Poll for activities above the given watermark.
async fn get_activities(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ActivitiesQuery>,
) -> impl Responder {
    let conversation = match conversation_or_404(&data, &path) {
        Ok(c) => c,
        Err(e) => return e.response(),
    };

    let watermark = query
        .watermark
        .as_deref()
        .and_then(|w| w.parse::<u64>().ok())
        .unwrap_or(0);

    let (activities, watermark) = conversation.get_activities_since(watermark);
    HttpResponse::Ok().json(ActivitySet {
        activities,
        watermark,
    })
}

fn relay_response(conversation_id: &str, data: &web::Data<AppState>, posted: PostedActivity) -> HttpResponse {
    if !(200..300).contains(&posted.status) {
        data.facilities.logger.log_message(
            conversation_id,
            LogItem::error(format!("The bot returned status {}.", posted.status)),
        );
        let status =
            StatusCode::from_u16(posted.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return HttpResponse::build(status).body(posted.body);
    }
    HttpResponse::Ok().json(ResourceResponse::new(posted.activity_id.unwrap_or_default()))
}

/// Client posts an activity; it is relayed to the bot endpoint.
async fn post_activity(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Activity>,
) -> impl Responder {
    let conversation_id = path.into_inner();
    let conversation = match conversation_or_404(&data, &conversation_id) {
        Ok(c) => c,
        Err(e) => {
            data.facilities.logger.log_message(
                &conversation_id,
                LogItem::error("Cannot post activity. Conversation not found."),
            );
            return e.response();
        }
    };

    match conversation.post_activity_to_bot(body.into_inner(), true).await {
        Ok(posted) => relay_response(&conversation_id, &data, posted),
        Err(e) => {
            data.facilities
                .logger
                .log_exception(&conversation_id, &e);
            e.response()
        }
    }
}

/// Multipart upload: an `activity` part plus one or more `file` parts. Files
/// become stored attachments referenced from the activity by view URL.
async fn upload(
    data: web::Data<AppState>,
    path: web::Path<String>,
    mut payload: Multipart,
) -> impl Responder {
    let conversation_id = path.into_inner();

    if conversation_id.contains("transcript") {
        return HttpResponse::Ok().finish();
    }

    let conversation = match conversation_or_404(&data, &conversation_id) {
        Ok(c) => c,
        Err(e) => {
            data.facilities.logger.log_message(
                &conversation_id,
                LogItem::error("Cannot upload file. Conversation not found."),
            );
            return e.response();
        }
    };

    let mut activity: Option<Activity> = None;
    let mut files: Vec<(String, String, Vec<u8>)> = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                return ApiError::bad_request(
                    ErrorCode::BadSyntax,
                    format!("malformed multipart payload: {}", e),
                )
                .response();
            }
        };

        let part_name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let file_name = field
            .content_disposition()
            .get_filename()
            .unwrap_or("file.dat")
            .to_string();
        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(e) => {
                    return ApiError::bad_request(
                        ErrorCode::BadSyntax,
                        format!("failed reading upload: {}", e),
                    )
                    .response();
                }
            }
        }

        match part_name.as_str() {
            "activity" => match serde_json::from_slice(&bytes) {
                Ok(parsed) => activity = Some(parsed),
                Err(e) => {
                    return ApiError::bad_request(
                        ErrorCode::BadSyntax,
                        format!("malformed activity part: {}", e),
                    )
                    .response();
                }
            },
            "file" => files.push((file_name, content_type, bytes)),
            _ => {}
        }
    }

    let Some(mut activity) = activity else {
        return ApiError::bad_request(ErrorCode::MissingProperty, "no activity part uploaded")
            .response();
    };
    if files.is_empty() {
        return ApiError::bad_request(ErrorCode::MissingProperty, "no file uploaded").response();
    }

    let mut attachments = Vec::with_capacity(files.len());
    for (name, content_type, bytes) in files {
        let content_base64 = STANDARD.encode(&bytes);
        let attachment_id = match data.facilities.attachments.upload(AttachmentData {
            content_type: content_type.clone(),
            name: name.clone(),
            original_base64: Some(content_base64.clone()),
            thumbnail_base64: Some(content_base64),
        }) {
            Ok(id) => id,
            Err(e) => return e.response(),
        };

        attachments.push(Attachment {
            name: Some(name),
            content_type: Some(content_type),
            content_url: Some(format!(
                "{}/v3/attachments/{}/views/original",
                data.facilities.service_url, attachment_id
            )),
            content: None,
            thumbnail_url: None,
        });
    }
    activity.attachments = Some(attachments);

    match conversation.post_activity_to_bot(activity, true).await {
        Ok(posted) => relay_response(&conversation_id, &data, posted),
        Err(e) => {
            data.facilities
                .logger
                .log_exception(&conversation_id, &e);
            e.response()
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v3/directline")
            .route("/conversations", web::post().to(start_conversation))
            .route(
                "/conversations/{conversation_id}",
                web::get().to(reconnect_to_conversation),
            )
            .route(
                "/conversations/{conversation_id}/activities",
                web::get().to(get_activities),
            )
            .route(
                "/conversations/{conversation_id}/activities",
                web::post().to(post_activity),
            )
            .route(
                "/conversations/{conversation_id}/upload",
                web::post().to(upload),
            ),
    );
}
