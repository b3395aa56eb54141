//! handlers/send_handler.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::config::send_config::SendConfig;
use crate::handlers::auth::{check_guard, internal_error, require_admin};
use crate::models::send_model::{CreateTaskResponse, SendRequest};
use crate::models::task_model::NewTask;
use crate::services::{
    rate_limiter::RateLimiter, request_guard::RequestGuard, retry_policy::RetryPolicy,
    send_service::{Outgoing, SendService},
    task_service::TaskService,
};

/// Auth + guard + validación comunes. Devuelve el body normalizado.
async fn admit(
    req: &HttpRequest,
    config: &SendConfig,
    guard: &RequestGuard,
    body: SendRequest,
) -> Result<SendRequest, HttpResponse> {
    let token = require_admin(req, config)?;
    if let Some(resp) = check_guard(guard, &token, body.request_id.as_deref()).await {
        return Err(resp);
    }

    let mut body = body;
    body.message = body.message.trim().to_string();
    if body.group_ids.is_empty() || body.message.is_empty() {
        return Err(HttpResponse::BadRequest()
            .json(json!({ "detail": "group_ids and message required" })));
    }
    Ok(body)
}

fn outgoing(body: &SendRequest, config: &SendConfig) -> Outgoing {
    Outgoing {
        account: body
            .account
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| config.default_account.clone()),
        message: body.message.clone(),
        parse_mode: body.parse_mode.clone(),
        disable_preview: body.disable_web_page_preview,
    }
}

fn retry_policy(body: &SendRequest, config: &SendConfig) -> RetryPolicy {
    RetryPolicy::new(
        body.retry_max.unwrap_or(config.retry_max),
        body.retry_delay_ms.unwrap_or(config.retry_delay_ms),
    )
}

/// POST /api/send
pub async fn send_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    guard: web::Data<RequestGuard>,
    send_service: web::Data<SendService>,
    body: web::Json<SendRequest>,
) -> HttpResponse {
    let body = match admit(&req, &config, &guard, body.into_inner()).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let delay_ms = body
        .delay_ms
        .unwrap_or(config.min_delay_ms)
        .max(config.min_delay_ms);
    let limiter = RateLimiter::new(config.min_delay_ms, config.jitter_pct);

    match send_service
        .send_to_groups(
            &outgoing(&body, &config),
            &body.group_ids,
            delay_ms,
            retry_policy(&body, &config),
            limiter,
        )
        .await
    {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => internal_error(e),
    }
}

/// POST /api/test-send
/// Igual que /api/send pero sin espera entre destinatarios.
pub async fn test_send_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    guard: web::Data<RequestGuard>,
    send_service: web::Data<SendService>,
    body: web::Json<SendRequest>,
) -> HttpResponse {
    let body = match admit(&req, &config, &guard, body.into_inner()).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match send_service
        .send_to_groups(
            &outgoing(&body, &config),
            &body.group_ids,
            0,
            retry_policy(&body, &config),
            RateLimiter::disabled(),
        )
        .await
    {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => internal_error(e),
    }
}

/// POST /api/send-async
pub async fn send_async_endpoint(
    req: HttpRequest,
    config: web::Data<SendConfig>,
    guard: web::Data<RequestGuard>,
    task_service: web::Data<TaskService>,
    body: web::Json<SendRequest>,
) -> HttpResponse {
    let body = match admit(&req, &config, &guard, body.into_inner()).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let out = outgoing(&body, &config);
    let retry = retry_policy(&body, &config);
    let new_task = NewTask {
        account: out.account,
        message: out.message,
        parse_mode: out.parse_mode,
        disable_preview: out.disable_preview,
        delay_ms: body
            .delay_ms
            .unwrap_or(config.min_delay_ms)
            .max(config.min_delay_ms),
        retry_max: retry.retry_max,
        retry_delay_ms: retry.retry_delay.as_millis() as u64,
        group_ids: body.group_ids,
        request_id: body.request_id,
    };

    match task_service.create_task(new_task).await {
        // El runner sigue en segundo plano
        Ok((task_id, _handle)) => HttpResponse::Ok().json(CreateTaskResponse { task_id }),
        Err(e) => internal_error(e),
    }
}
