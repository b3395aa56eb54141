//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod send_log_model;
pub mod send_model;
pub mod task_model;
