//! services/send_log_service.rs
//! Registro de resultados por destinatario (`send_logs`) y su exportación a CSV.

use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};

use crate::models::send_log_model::{NewSendLog, SendLogRecord};
use crate::services::task_store::now_ts;

const CSV_HEADER: [&str; 10] = [
    "id",
    "account_name",
    "group_id",
    "group_title",
    "message_preview",
    "status",
    "error",
    "message_id",
    "parse_mode",
    "created_at",
];

#[derive(Clone, Debug)]
pub struct SendLogService {
    db_pool: Pool<Sqlite>,
}

impl SendLogService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        SendLogService { db_pool }
    }

    pub async fn insert(&self, log: &NewSendLog) -> Result<i64> {
        let res = sqlx::query(
            r#"
            INSERT INTO send_logs (
                account_name, group_id, group_title, message_preview,
                status, error, message_id, parse_mode, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&log.account)
        .bind(log.group_id)
        .bind(&log.group_title)
        .bind(&log.message_preview)
        .bind(log.status.as_str())
        .bind(&log.error)
        .bind(log.message_id)
        .bind(&log.parse_mode)
        .bind(now_ts())
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar send_log")?;

        Ok(res.last_insert_rowid())
    }

    /// Más recientes primero, filtrando opcionalmente por status
    pub async fn recent(&self, limit: i64, status: Option<&str>) -> Result<Vec<SendLogRecord>> {
        let rows = sqlx::query_as::<_, SendLogRecord>(
            r#"
            SELECT id, account_name, group_id, group_title, message_preview,
                   status, error, message_id, parse_mode, created_at
            FROM send_logs
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar send_logs")?;

        Ok(rows)
    }

    pub async fn export_csv(&self, limit: i64, status: Option<&str>) -> Result<String> {
        let rows = self.recent(limit, status).await?;
        Ok(render_csv(&rows))
    }
}

pub fn render_csv(rows: &[SendLogRecord]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push_str("\r\n");

    for r in rows {
        let fields = [
            r.id.to_string(),
            r.account_name.clone(),
            r.group_id.to_string(),
            r.group_title.clone(),
            flatten(&r.message_preview),
            r.status.clone(),
            flatten(r.error.as_deref().unwrap_or("")),
            r.message_id.map(|m| m.to_string()).unwrap_or_default(),
            r.parse_mode.clone().unwrap_or_default(),
            r.created_at.clone(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

fn flatten(s: &str) -> String {
    s.replace(['\r', '\n'], " ").trim().to_string()
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
