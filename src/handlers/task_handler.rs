//! handlers/task_handler.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::config::send_config::SendConfig;
use crate::handlers::auth::{internal_error, require_admin};
use crate::models::task_model::{ControlAction, TaskControlRequest};
use crate::services::task_service::TaskService;

#[derive(Deserialize)]
pub struct TaskQuery {
    task_id: Option<String>,
    page: Option<u64>,
    size: Option<u64>,
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "detail": "Not Found" }))
}

/// GET /api/task-status?task_id=
pub async fn task_status_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    task_service: web::Data<TaskService>,
    query: web::Query<TaskQuery>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &config) {
        return resp;
    }
    let Some(task_id) = query.task_id.as_deref().filter(|id| !id.is_empty()) else {
        return not_found();
    };

    match task_service.status(task_id).await {
        Ok(Some(snapshot)) => HttpResponse::Ok().json(snapshot),
        Ok(None) => not_found(),
        Err(e) => internal_error(e),
    }
}

/// GET /api/tasks
pub async fn list_tasks_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    task_service: web::Data<TaskService>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &config) {
        return resp;
    }
    match task_service.list(100).await {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => internal_error(e),
    }
}

/// GET /api/task-events?task_id=&page=&size=
pub async fn task_events_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    task_service: web::Data<TaskService>,
    query: web::Query<TaskQuery>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &config) {
        return resp;
    }
    let Some(task_id) = query.task_id.as_deref().filter(|id| !id.is_empty()) else {
        return HttpResponse::BadRequest().json(json!({ "detail": "task_id required" }));
    };
    let page = query.page.unwrap_or(1).max(1);
    let size = query.size.unwrap_or(50).clamp(1, 500);

    match task_service.events(task_id, page, size).await {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => internal_error(e),
    }
}

/// POST /api/task-control {task_id, action: pause|resume|stop}
pub async fn task_control_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    task_service: web::Data<TaskService>,
    body: web::Json<TaskControlRequest>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &config) {
        return resp;
    }
    let body = body.into_inner();
    let task_id = body.task_id.unwrap_or_default();
    let action = body.action.as_deref().and_then(ControlAction::parse);
    let Some(action) = action.filter(|_| !task_id.is_empty()) else {
        return HttpResponse::BadRequest().json(json!({ "detail": "bad_request" }));
    };

    match task_service.control(&task_id, action).await {
        Ok(true) => HttpResponse::Ok().json(json!({ "ok": true })),
        Ok(false) => not_found(),
        Err(e) => internal_error(e),
    }
}
