//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod dedup_guard;
pub mod delivery_client;
pub mod rate_limiter;
pub mod recovery_service;
pub mod request_guard;
pub mod retry_policy;
pub mod send_log_service;
pub mod send_service;
pub mod task_control;
pub mod task_runner;
pub mod task_service;
pub mod task_store;
