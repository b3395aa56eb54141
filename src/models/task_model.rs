use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Etapa del ciclo de vida de una tarea. `Running` es el único estado no terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Done,
    Stopped,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "done" => Ok(TaskStatus::Done),
            "stopped" => Ok(TaskStatus::Stopped),
            "error" => Ok(TaskStatus::Error),
            other => Err(anyhow!("Estado de tarea desconocido: {}", other)),
        }
    }
}

/// Tipo de evento de auditoría
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Created,
    Progress,
    Paused,
    Resumed,
    StopRequested,
    Stopped,
    Finished,
    Error,
}

impl TaskEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEventKind::Created => "created",
            TaskEventKind::Progress => "progress",
            TaskEventKind::Paused => "paused",
            TaskEventKind::Resumed => "resumed",
            TaskEventKind::StopRequested => "stop_requested",
            TaskEventKind::Stopped => "stopped",
            TaskEventKind::Finished => "finished",
            TaskEventKind::Error => "error",
        }
    }
}

/// Fila de `tasks`, ya parseada.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: String,
    pub status: TaskStatus,
    pub paused: bool,
    pub stop_requested: bool,
    pub account: String,
    pub message: String,
    pub parse_mode: String,
    pub disable_preview: bool,
    pub delay_ms: u64,
    pub retry_max: u32,
    pub retry_delay_ms: u64,
    pub group_ids: Vec<i64>,
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub current_index: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub request_id: Option<String>,
}

impl TaskRecord {
    /// Destinatarios todavía sin procesar: `group_ids[current_index..]`
    pub fn remaining(&self) -> &[i64] {
        let start = (self.current_index.max(0) as usize).min(self.group_ids.len());
        &self.group_ids[start..]
    }
}

/// Parámetros inmutables de una tarea nueva
#[derive(Debug, Clone)]
pub struct NewTask {
    pub account: String,
    pub message: String,
    pub parse_mode: String,
    pub disable_preview: bool,
    pub delay_ms: u64,
    pub retry_max: u32,
    pub retry_delay_ms: u64,
    pub group_ids: Vec<i64>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskEventRecord {
    pub id: i64,
    pub task_id: String,
    pub ts: String,
    pub event: String,
    pub detail: Option<String>,
    pub meta_json: Option<String>,
}

/// Acción de control sobre una tarea en curso
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Pause,
    Resume,
    Stop,
}

impl ControlAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pause" => Some(ControlAction::Pause),
            "resume" => Some(ControlAction::Resume),
            "stop" => Some(ControlAction::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskControlRequest {
    pub task_id: Option<String>,
    pub action: Option<String>,
}

/// Snapshot de contadores para /api/task-status y /api/tasks
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: String,
    pub paused: bool,
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub current_index: i64,
    pub account: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub heartbeat_at: Option<String>,
}

impl From<&TaskRecord> for TaskStatusResponse {
    fn from(t: &TaskRecord) -> Self {
        TaskStatusResponse {
            task_id: t.id.clone(),
            status: t.status.to_string(),
            paused: t.paused,
            total: t.total,
            success: t.success,
            failed: t.failed,
            current_index: t.current_index,
            account: t.account.clone(),
            started_at: t.started_at.to_rfc3339(),
            finished_at: t.finished_at.map(|d| d.to_rfc3339()),
            heartbeat_at: t.heartbeat_at.map(|d| d.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskEventsPage {
    pub page: u64,
    pub size: u64,
    pub items: Vec<TaskEventRecord>,
}
