use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::controllers::endpoint_from_request;
use crate::models::{ApiError, ErrorCode, TokenParams};
use crate::AppState;

/// Bot asks for a user's cached OAuth token.
async fn get_token(
    data: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TokenParams>,
) -> impl Responder {
    let Some(endpoint) = endpoint_from_request(&data, &req) else {
        return ApiError::new(
            actix_web::http::StatusCode::UNAUTHORIZED,
            ErrorCode::ServiceError,
            "no bot endpoint is configured",
        )
        .response();
    };

    match data.facilities.token_cache.get_token(
        &endpoint.bot_id,
        &query.user_id,
        &query.connection_name,
    ) {
        Some(token) => HttpResponse::Ok().json(token),
        None => HttpResponse::NotFound().finish(),
    }
}

async fn sign_out(
    data: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TokenParams>,
) -> impl Responder {
    let Some(endpoint) = endpoint_from_request(&data, &req) else {
        return ApiError::new(
            actix_web::http::StatusCode::UNAUTHORIZED,
            ErrorCode::ServiceError,
            "no bot endpoint is configured",
        )
        .response();
    };

    data.facilities.token_cache.delete_token(
        &endpoint.bot_id,
        &query.user_id,
        &query.connection_name,
    );
    HttpResponse::Ok().finish()
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/usertoken")
            .route("/GetToken", web::get().to(get_token))
            .route("/SignOut", web::delete().to(sign_out)),
    );
}
