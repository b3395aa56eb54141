//! config/mod.rs
pub mod send_config;
