//! logger.rs
//! Logger global (env_logger). El nivel sale de RUST_LOG; por defecto `info`,
//! con sqlx bajado a `warn` para no loguear cada query.

pub fn init_logger() {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,sqlx=warn,actix_server=warn".to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .format_module_path(false)
        .init();
}
