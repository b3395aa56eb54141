//! config/send_config.rs
//! Configuración global del servicio de envíos (límites, reintentos, cuentas).
//! Se carga una sola vez en el arranque desde variables de entorno (.env incluido).

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    pub admin_token: String,
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,

    /// Cuenta usada cuando el request no indica ninguna
    pub default_account: String,
    /// nombre de cuenta -> token del bot
    #[serde(skip_serializing)]
    pub accounts: HashMap<String, String>,
    pub delivery_api_url: String,

    // Límites de envío
    pub min_delay_ms: u64,
    pub jitter_pct: f64, // fracción, 0.0 - 0.5
    pub dedup_window_secs: u64,
    pub retry_max: u32,
    pub retry_delay_ms: u64,
    pub pause_poll_ms: u64,

    // Guard de requests entrantes
    pub request_guard_window_ms: u64,
    pub request_id_ttl_secs: u64,

    pub recovery_scan_limit: i64,
    pub message_preview_chars: usize,
}

impl Default for SendConfig {
    fn default() -> Self {
        SendConfig {
            admin_token: String::new(),
            database_url: "sqlite:data/broadcast.db".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            default_account: "default".to_string(),
            accounts: HashMap::new(),
            delivery_api_url: "https://api.telegram.org".to_string(),
            min_delay_ms: 1500,
            jitter_pct: 0.15,
            dedup_window_secs: 120,
            retry_max: 0,
            retry_delay_ms: 1500,
            pause_poll_ms: 1000,
            request_guard_window_ms: 500,
            request_id_ttl_secs: 60,
            recovery_scan_limit: 100,
            message_preview_chars: 200,
        }
    }
}

impl SendConfig {
    /// Lee la configuración del entorno. Las variables ausentes o mal formadas
    /// conservan el valor por defecto.
    pub fn from_env() -> Self {
        let defaults = SendConfig::default();

        let accounts = env::var("ACCOUNTS")
            .map(|raw| parse_accounts(&raw))
            .unwrap_or_default();

        let config = SendConfig {
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_default(),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: env_or("PORT", defaults.port),
            default_account: env::var("DEFAULT_ACCOUNT").unwrap_or(defaults.default_account),
            accounts,
            delivery_api_url: env::var("DELIVERY_API_URL").unwrap_or(defaults.delivery_api_url),
            min_delay_ms: env_or("SEND_MIN_DELAY_MS", defaults.min_delay_ms),
            jitter_pct: env_or("SEND_JITTER_PCT", defaults.jitter_pct).clamp(0.0, 0.5),
            dedup_window_secs: env_or("SEND_DEDUP_WINDOW_SECS", defaults.dedup_window_secs),
            retry_max: env_or("SEND_RETRY_MAX", defaults.retry_max),
            retry_delay_ms: env_or("SEND_RETRY_DELAY_MS", defaults.retry_delay_ms),
            pause_poll_ms: env_or("TASK_PAUSE_POLL_MS", defaults.pause_poll_ms),
            request_guard_window_ms: env_or(
                "REQUEST_GUARD_WINDOW_MS",
                defaults.request_guard_window_ms,
            ),
            request_id_ttl_secs: env_or("REQUEST_ID_TTL_SECS", defaults.request_id_ttl_secs),
            recovery_scan_limit: env_or("RECOVERY_SCAN_LIMIT", defaults.recovery_scan_limit),
            message_preview_chars: env_or("MESSAGE_PREVIEW_CHARS", defaults.message_preview_chars),
        };

        if config.admin_token.is_empty() {
            log::warn!("ADMIN_TOKEN vacío: todas las llamadas a /api serán rechazadas");
        }
        config
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Valor inválido para {}='{}', usando el default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Formato: `nombre=token,otra=token2`
pub fn parse_accounts(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, token) = pair.split_once('=')?;
            let name = name.trim();
            let token = token.trim();
            if name.is_empty() || token.is_empty() {
                return None;
            }
            Some((name.to_string(), token.to_string()))
        })
        .collect()
}
