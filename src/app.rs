//! app.rs
use crate::handlers::{log_handler, send_handler, task_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/accounts", web::get().to(log_handler::list_accounts_endpoint))
            .route("/send", web::post().to(send_handler::send_endpoint))
            .route("/test-send", web::post().to(send_handler::test_send_endpoint))
            .route("/send-async", web::post().to(send_handler::send_async_endpoint))
            .route(
                "/task-status",
                web::get().to(task_handler::task_status_endpoint),
            )
            .route("/tasks", web::get().to(task_handler::list_tasks_endpoint))
            .route(
                "/task-events",
                web::get().to(task_handler::task_events_endpoint),
            )
            .route(
                "/task-control",
                web::post().to(task_handler::task_control_endpoint),
            )
            .service(
                web::scope("/logs")
                    .route("", web::get().to(log_handler::recent_logs_endpoint))
                    .route(
                        "/export.csv",
                        web::get().to(log_handler::export_logs_csv_endpoint),
                    ),
            ),
    );
}
