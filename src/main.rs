use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::send_config::SendConfig;
use crate::logger::init_logger;
use crate::services::{
    dedup_guard::DedupGuard, delivery_client::BotApiClient, rate_limiter::RateLimiter,
    recovery_service::RecoveryService, request_guard::RequestGuard,
    send_log_service::SendLogService, send_service::SendService, task_control::ControlRegistry,
    task_runner::TaskRunner, task_service::TaskService, task_store::TaskStore,
};

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;
#[cfg(test)]
mod tests;

async fn setup_database(db_url: &str) -> anyhow::Result<Pool<Sqlite>> {
    // Crear la carpeta del archivo si hace falta (ej: sqlite:data/broadcast.db)
    if let Some(path) = db_url.strip_prefix("sqlite:") {
        let path = path.trim_start_matches("//").split('?').next().unwrap_or("");
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && path != ":memory:" {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    log::info!("Conectando a SQLite en {}", db_url);
    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = SendConfig::from_env();

    let db_pool = setup_database(&config.database_url)
        .await
        .expect("No se pudo conectar a la base de datos SQLite.");

    // Store de tareas (corre las migraciones de todas las tablas)
    let task_store = TaskStore::new(db_pool.clone());
    if let Err(e) = task_store.run_migrations().await {
        panic!("Fallo en migraciones: {:?}", e);
    }
    let log_service = SendLogService::new(db_pool.clone());

    // Componentes compartidos, uno por proceso
    let client = Arc::new(
        BotApiClient::new(&config.delivery_api_url, config.accounts.clone())
            .expect("No se pudo inicializar el cliente de entrega"),
    );
    let dedup = Arc::new(DedupGuard::new());
    let controls = Arc::new(ControlRegistry::new());
    let request_guard = web::Data::new(RequestGuard::new(
        config.request_guard_window_ms,
        config.request_id_ttl_secs,
    ));

    let send_service = SendService::new(
        client,
        dedup,
        log_service.clone(),
        Duration::from_secs(config.dedup_window_secs),
        config.message_preview_chars,
    );
    let runner = TaskRunner::new(
        task_store.clone(),
        send_service.clone(),
        controls.clone(),
        RateLimiter::new(config.min_delay_ms, config.jitter_pct),
        Duration::from_millis(config.pause_poll_ms),
    );
    let task_service = TaskService::new(task_store.clone(), runner.clone(), controls);

    // Relanzar tareas que quedaron en running
    let recovery = RecoveryService::new(task_store, runner, config.recovery_scan_limit);
    match recovery.resume_running_tasks().await {
        Ok(launched) => log::info!("Recuperación: {} tareas relanzadas", launched.len()),
        Err(e) => log::error!("Recuperación falló: {:?}", e),
    }

    let bind = (config.bind_addr.clone(), config.port);
    let config = web::Data::new(config);

    log::info!("Levantando servidor en {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .app_data(request_guard.clone())
            .app_data(web::Data::new(send_service.clone()))
            .app_data(web::Data::new(task_service.clone()))
            .app_data(web::Data::new(log_service.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind(bind)?
    .run()
    .await
}
