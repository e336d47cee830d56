use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn health(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": VERSION,
        "conversations": data.facilities.conversations.len(),
    }))
}

async fn version() -> impl Responder {
    HttpResponse::Ok().json(json!({ "version": VERSION }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(health))
        .route("/api/version", web::get().to(version));
}
