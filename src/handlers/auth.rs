//! handlers/auth.rs
//! Chequeo del header X-Admin-Token y respuestas del guard de requests.

use actix_web::{http::StatusCode, HttpRequest, HttpResponse};
use serde_json::json;

use crate::config::send_config::SendConfig;
use crate::services::request_guard::{Admission, RequestGuard};

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Devuelve el token si coincide con el configurado, o la respuesta 401 lista.
pub fn require_admin(req: &HttpRequest, config: &SendConfig) -> Result<String, HttpResponse> {
    let token = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if config.admin_token.is_empty() || token != config.admin_token {
        return Err(HttpResponse::Unauthorized().json(json!({ "detail": "Unauthorized" })));
    }
    Ok(token.to_string())
}

/// None = admitido
pub async fn check_guard(
    guard: &RequestGuard,
    token: &str,
    request_id: Option<&str>,
) -> Option<HttpResponse> {
    match guard.admit(token, request_id).await {
        Admission::Allow => None,
        Admission::Duplicate => Some(
            HttpResponse::build(StatusCode::CONFLICT)
                .json(json!({ "detail": "duplicate_request" })),
        ),
        Admission::TooFrequent => Some(
            HttpResponse::TooManyRequests()
                .insert_header(("Retry-After", "1"))
                .json(json!({ "detail": "Too Many Requests" })),
        ),
    }
}

pub fn internal_error(e: anyhow::Error) -> HttpResponse {
    log::error!("Internal error: {:?}", e);
    HttpResponse::InternalServerError().json(json!({
        "error": "Internal server error",
        "details": format!("{:?}", e)
    }))
}
