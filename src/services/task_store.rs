//! services/task_store.rs
//! Persistencia de tareas y de su traza de auditoría (`task_events`).
//! Es la única fuente de verdad para los flags de control (`paused`, `stop_requested`).

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::send_log_model::SendStatus;
use crate::models::task_model::{
    NewTask, TaskEventKind, TaskEventRecord, TaskEventsPage, TaskRecord, TaskStatus,
};

/// Timestamp RFC3339 de ancho fijo, así el orden lexicográfico coincide con el temporal.
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 24 caracteres hex aleatorios
fn new_task_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

/// SQLite guarda enteros con signo: los u64 fuera de rango se saturan
fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    status: String,
    paused: i64,
    stop_requested: i64,
    account_name: String,
    message: String,
    parse_mode: String,
    disable_web_page_preview: i64,
    delay_ms: i64,
    retry_max: i64,
    retry_delay_ms: i64,
    group_ids_json: String,
    total: i64,
    success: i64,
    failed: i64,
    current_index: i64,
    started_at: String,
    finished_at: Option<String>,
    heartbeat_at: Option<String>,
    request_id: Option<String>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = anyhow::Error;

    fn try_from(r: TaskRow) -> Result<Self> {
        let group_ids: Vec<i64> =
            serde_json::from_str(&r.group_ids_json).context("group_ids_json corrupto")?;
        Ok(TaskRecord {
            status: r.status.parse()?,
            paused: r.paused != 0,
            stop_requested: r.stop_requested != 0,
            account: r.account_name,
            message: r.message,
            parse_mode: r.parse_mode,
            disable_preview: r.disable_web_page_preview != 0,
            delay_ms: r.delay_ms.max(0) as u64,
            retry_max: r.retry_max.max(0) as u32,
            retry_delay_ms: r.retry_delay_ms.max(0) as u64,
            group_ids,
            total: r.total,
            success: r.success,
            failed: r.failed,
            current_index: r.current_index,
            started_at: r.started_at.parse()?,
            finished_at: r.finished_at.map(|s| s.parse()).transpose()?,
            heartbeat_at: r.heartbeat_at.map(|s| s.parse()).transpose()?,
            request_id: r.request_id,
            id: r.id,
        })
    }
}

const TASK_COLUMNS: &str = r#"
    id, status, paused, stop_requested, account_name, message, parse_mode,
    disable_web_page_preview, delay_ms, retry_max, retry_delay_ms, group_ids_json,
    total, success, failed, current_index, started_at, finished_at, heartbeat_at,
    request_id
"#;

#[derive(Clone, Debug)]
pub struct TaskStore {
    db_pool: Pool<Sqlite>,
}

impl TaskStore {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        TaskStore { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo en migraciones de tasks/send_logs")?;
        Ok(())
    }

    /// Inserta la tarea en estado "running" junto con su evento `created`,
    /// en una sola transacción.
    pub async fn create_task(&self, task: &NewTask) -> Result<String> {
        let task_id = new_task_id();
        let now = now_ts();
        let group_ids_json = serde_json::to_string(&task.group_ids)?;
        let total = task.group_ids.len() as i64;
        let meta = serde_json::json!({ "count": total }).to_string();

        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, status, paused, stop_requested, account_name, message, parse_mode,
                disable_web_page_preview, delay_ms, retry_max, retry_delay_ms,
                group_ids_json, total, success, failed, current_index,
                started_at, request_id
            )
            VALUES (?1, 'running', 0, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 0, 0, ?11, ?12)
            "#,
        )
        .bind(&task_id)
        .bind(&task.account)
        .bind(&task.message)
        .bind(&task.parse_mode)
        .bind(task.disable_preview as i64)
        .bind(clamp_i64(task.delay_ms))
        .bind(task.retry_max as i64)
        .bind(clamp_i64(task.retry_delay_ms))
        .bind(group_ids_json)
        .bind(total)
        .bind(&now)
        .bind(&task.request_id)
        .execute(&mut *tx)
        .await
        .context("Fallo al insertar task")?;

        sqlx::query(
            r#"
            INSERT INTO task_events (task_id, ts, event, detail, meta_json)
            VALUES (?1, ?2, 'created', 'task_created', ?3)
            "#,
        )
        .bind(&task_id)
        .bind(&now)
        .bind(meta)
        .execute(&mut *tx)
        .await
        .context("Fallo al insertar evento created")?;

        tx.commit().await?;
        Ok(task_id)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(task_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al leer task")?;

        row.map(TaskRecord::try_from).transpose()
    }

    /// Últimas tareas, más recientes primero
    pub async fn list_tasks(&self, limit: i64) -> Result<Vec<TaskRecord>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY started_at DESC LIMIT ?1");
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(limit)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar tasks")?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }

    /// Tareas que quedaron en "running" (usado por la recuperación al arrancar)
    pub async fn list_running(&self, limit: i64) -> Result<Vec<TaskRecord>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'running' ORDER BY started_at ASC LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(limit)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar tasks en running")?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }

    /// Devuelve false si la tarea no existe
    pub async fn set_paused(&self, task_id: &str, paused: bool) -> Result<bool> {
        let res = sqlx::query("UPDATE tasks SET paused = ?2 WHERE id = ?1")
            .bind(task_id)
            .bind(paused as i64)
            .execute(&self.db_pool)
            .await
            .context("Fallo al actualizar paused")?;
        Ok(res.rows_affected() > 0)
    }

    /// Devuelve false si la tarea no existe
    pub async fn request_stop(&self, task_id: &str) -> Result<bool> {
        let res = sqlx::query("UPDATE tasks SET stop_requested = 1 WHERE id = ?1")
            .bind(task_id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al marcar stop_requested")?;
        Ok(res.rows_affected() > 0)
    }

    /// Avanza el cursor en uno y suma el resultado a los contadores.
    /// Devuelve `(current_index, total)` ya actualizados.
    pub async fn record_progress(&self, task_id: &str, outcome: SendStatus) -> Result<(i64, i64)> {
        let (succ, fail) = match outcome {
            SendStatus::Success => (1, 0),
            SendStatus::Failed => (0, 1),
            SendStatus::Skipped => (0, 0),
        };

        let row: (i64, i64) = sqlx::query_as(
            r#"
            UPDATE tasks
            SET current_index = MIN(current_index + 1, total),
                success = success + ?2,
                failed = failed + ?3,
                heartbeat_at = ?4
            WHERE id = ?1
            RETURNING current_index, total
            "#,
        )
        .bind(task_id)
        .bind(succ)
        .bind(fail)
        .bind(now_ts())
        .fetch_one(&self.db_pool)
        .await
        .context("Fallo al registrar progreso")?;

        Ok(row)
    }

    /// Cierra la tarea. `Done` no pisa un estado terminal ya escrito (stopped/error).
    pub async fn finalize(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        let sql = if status == TaskStatus::Done {
            r#"
            UPDATE tasks
            SET status = CASE WHEN status = 'running' THEN ?2 ELSE status END,
                finished_at = ?3
            WHERE id = ?1
            "#
        } else {
            "UPDATE tasks SET status = ?2, finished_at = ?3 WHERE id = ?1"
        };

        sqlx::query(sql)
            .bind(task_id)
            .bind(status.as_str())
            .bind(now_ts())
            .execute(&self.db_pool)
            .await
            .context("Fallo al finalizar task")?;
        Ok(())
    }

    /// Agrega un evento. La tabla es append-only: no hay update ni delete.
    pub async fn append_event(
        &self,
        task_id: &str,
        kind: TaskEventKind,
        detail: &str,
        meta: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO task_events (task_id, ts, event, detail, meta_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(task_id)
        .bind(now_ts())
        .bind(kind.as_str())
        .bind(detail)
        .bind(meta.to_string())
        .execute(&self.db_pool)
        .await
        .with_context(|| format!("Fallo al insertar evento {}", kind.as_str()))?;
        Ok(())
    }

    /// Eventos de una tarea, más recientes primero, paginados (page empieza en 1)
    pub async fn list_events(&self, task_id: &str, page: u64, size: u64) -> Result<TaskEventsPage> {
        let page = page.max(1);
        let offset = clamp_i64((page - 1).saturating_mul(size));

        let rows: Vec<(i64, String, String, String, Option<String>, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT id, task_id, ts, event, detail, meta_json
                FROM task_events
                WHERE task_id = ?1
                ORDER BY ts DESC, id DESC
                LIMIT ?2 OFFSET ?3
                "#,
            )
            .bind(task_id)
            .bind(clamp_i64(size))
            .bind(offset)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar task_events")?;

        let items = rows
            .into_iter()
            .map(|(id, task_id, ts, event, detail, meta_json)| TaskEventRecord {
                id,
                task_id,
                ts,
                event,
                detail,
                meta_json,
            })
            .collect();

        Ok(TaskEventsPage { page, size, items })
    }
}
