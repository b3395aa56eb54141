//! handlers/log_handler.rs
use actix_web::{web, HttpRequest, HttpResponse};

use crate::config::send_config::SendConfig;
use crate::handlers::auth::{internal_error, require_admin};
use crate::models::send_log_model::LogsQuery;
use crate::services::send_log_service::SendLogService;

/// GET /api/logs?limit=
pub async fn recent_logs_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    log_service: web::Data<SendLogService>,
    query: web::Query<LogsQuery>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &config) {
        return resp;
    }
    let limit = query.limit.unwrap_or(50).clamp(1, 1000);

    match log_service.recent(limit, query.status.as_deref()).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => internal_error(e),
    }
}

/// GET /api/logs/export.csv?limit=&status=
pub async fn export_logs_csv_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    log_service: web::Data<SendLogService>,
    query: web::Query<LogsQuery>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &config) {
        return resp;
    }
    let limit = query.limit.unwrap_or(1000).clamp(1, 100_000);
    let status = query.status.as_deref().filter(|s| !s.is_empty());

    match log_service.export_csv(limit, status).await {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                "Content-Disposition",
                "attachment; filename=send_logs.csv",
            ))
            .body(csv),
        Err(e) => internal_error(e),
    }
}

/// GET /api/accounts
pub async fn list_accounts_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &config) {
        return resp;
    }
    let mut names: Vec<&String> = config.accounts.keys().collect();
    names.sort();
    HttpResponse::Ok().json(names)
}
