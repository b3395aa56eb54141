//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers (envíos, tareas, logs).
pub mod auth;
pub mod log_handler;
pub mod send_handler;
pub mod task_handler;
