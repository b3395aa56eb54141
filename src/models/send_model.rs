use serde::{Deserialize, Serialize};

fn default_parse_mode() -> String {
    "plain".to_string()
}

fn default_true() -> bool {
    true
}

/// Body común de /api/send, /api/test-send y /api/send-async.
/// Los campos opcionales toman los defaults de `SendConfig`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub group_ids: Vec<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
    #[serde(default = "default_true")]
    pub disable_web_page_preview: bool,
    pub delay_ms: Option<u64>,
    pub retry_max: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub account: Option<String>,
    pub request_id: Option<String>,
}

/// Resumen de un envío síncrono
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
}
