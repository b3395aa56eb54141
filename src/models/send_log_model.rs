use serde::{Deserialize, Serialize};

/// Resultado final de un destinatario (no de cada intento)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Success,
    Failed,
    Skipped,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Success => "success",
            SendStatus::Failed => "failed",
            SendStatus::Skipped => "skipped",
        }
    }
}

/// Fila a insertar en `send_logs`
#[derive(Debug, Clone)]
pub struct NewSendLog {
    pub account: String,
    pub group_id: i64,
    pub group_title: String,
    pub message_preview: String,
    pub status: SendStatus,
    pub error: Option<String>,
    pub message_id: Option<i64>,
    pub parse_mode: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SendLogRecord {
    pub id: i64,
    pub account_name: String,
    pub group_id: i64,
    pub group_title: String,
    pub message_preview: String,
    pub status: String,
    pub error: Option<String>,
    pub message_id: Option<i64>,
    pub parse_mode: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    pub status: Option<String>,
}
