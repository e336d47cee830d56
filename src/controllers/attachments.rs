use actix_web::{web, HttpResponse, Responder};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::models::{ApiError, AttachmentInfo, AttachmentView, ErrorCode};
use crate::AppState;

fn decoded_len(base64_payload: &str) -> usize {
    STANDARD
        .decode(base64_payload)
        .map(|bytes| bytes.len())
        .unwrap_or(0)
}

async fn get_attachment_info(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let attachment = match data.facilities.attachments.get(&path) {
        Some(attachment) => attachment,
        None => {
            return ApiError::not_found(ErrorCode::BadArgument, "attachment not found").response();
        }
    };

    let mut views = Vec::new();
    if let Some(original) = &attachment.original_base64 {
        views.push(AttachmentView {
            view_id: "original".to_string(),
            size: decoded_len(original),
        });
    }
    if let Some(thumbnail) = &attachment.thumbnail_base64 {
        views.push(AttachmentView {
            view_id: "thumbnail".to_string(),
            size: decoded_len(thumbnail),
        });
    }

    HttpResponse::Ok().json(AttachmentInfo {
        name: attachment.name,
        content_type: attachment.content_type,
        views,
    })
}

async fn get_attachment(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (attachment_id, view_id) = path.into_inner();

    let attachment = match data.facilities.attachments.get(&attachment_id) {
        Some(attachment) => attachment,
        None => {
            return ApiError::not_found(ErrorCode::BadArgument, "attachment not found").response();
        }
    };

    let payload = match view_id.as_str() {
        "original" => attachment.original_base64,
        "thumbnail" => attachment.thumbnail_base64,
        _ => None,
    };
    let Some(payload) = payload else {
        return ApiError::not_found(ErrorCode::BadArgument, "view not found").response();
    };

    match STANDARD.decode(payload) {
        Ok(bytes) => HttpResponse::Ok()
            .content_type(attachment.content_type)
            .body(bytes),
        Err(_) => ApiError::service_error("attachment payload is not valid base64").response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v3/attachments")
            .route("/{attachment_id}", web::get().to(get_attachment_info))
            .route(
                "/{attachment_id}/views/{view_id}",
                web::get().to(get_attachment),
            ),
    );
}
