//! services/task_runner.rs
//! Bucle de una tarea: recorre los destinatarios pendientes en orden, respeta
//! pausa/stop, registra progreso y deja la tarea en un estado terminal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::models::task_model::{TaskEventKind, TaskRecord, TaskStatus};
use crate::services::{
    rate_limiter::RateLimiter,
    retry_policy::RetryPolicy,
    send_service::{Outgoing, SendService},
    task_control::{ControlHandle, ControlRegistry, ControlSignal},
    task_store::TaskStore,
};

#[derive(Clone)]
pub struct TaskRunner {
    store: TaskStore,
    sender: SendService,
    controls: Arc<ControlRegistry>,
    limiter: RateLimiter,
    pause_poll: Duration,
}

impl TaskRunner {
    pub fn new(
        store: TaskStore,
        sender: SendService,
        controls: Arc<ControlRegistry>,
        limiter: RateLimiter,
        pause_poll: Duration,
    ) -> Self {
        Self {
            store,
            sender,
            controls,
            limiter,
            pause_poll,
        }
    }

    /// Registra el canal de control y lanza el bucle en segundo plano.
    /// Procesa `group_ids[current_index..]` conservando id, contadores y flags.
    pub async fn launch(&self, task: TaskRecord) -> JoinHandle<TaskStatus> {
        let handle = self
            .controls
            .register(&task.id, ControlSignal::from(&task))
            .await;
        let runner = self.clone();
        tokio::spawn(async move { runner.run(task, handle).await })
    }

    /// Nunca propaga: cualquier error no clasificado termina la tarea en `error`.
    pub async fn run(&self, task: TaskRecord, mut handle: ControlHandle) -> TaskStatus {
        log::info!(
            "(run) Iniciando task_id={} desde índice {}/{}",
            task.id,
            task.current_index,
            task.total
        );

        let status = match self.run_loop(&task, &mut handle).await {
            Ok(status) => status,
            Err(e) => {
                log::error!("(run) task_id={} abortada: {:?}", task.id, e);
                if let Err(fe) = self.store.finalize(&task.id, TaskStatus::Error).await {
                    log::error!("(run) No se pudo marcar 'error' en task_id={}: {:?}", task.id, fe);
                }
                self.audit(
                    &task.id,
                    TaskEventKind::Error,
                    "task_error",
                    json!({ "error": format!("{:#}", e) }),
                )
                .await;
                TaskStatus::Error
            }
        };

        self.controls.unregister(&task.id).await;
        log::info!("(run) task_id={} terminó en '{}'", task.id, status);
        status
    }

    async fn run_loop(&self, task: &TaskRecord, handle: &mut ControlHandle) -> Result<TaskStatus> {
        let out = Outgoing {
            account: task.account.clone(),
            message: task.message.clone(),
            parse_mode: task.parse_mode.clone(),
            disable_preview: task.disable_preview,
        };
        let retry = RetryPolicy::new(task.retry_max, task.retry_delay_ms);
        let remaining = task.remaining();

        for (pos, gid) in remaining.iter().enumerate() {
            let mut signal = self.read_control(&task.id, handle).await?;
            if signal.stop_requested {
                return self.finish_stopped(&task.id).await;
            }

            if signal.paused {
                log::info!("(run_loop) task_id={} en pausa", task.id);
                while signal.paused && !signal.stop_requested {
                    handle.wait_change_or(self.pause_poll).await;
                    signal = self.read_control(&task.id, handle).await?;
                }
                if signal.stop_requested {
                    return self.finish_stopped(&task.id).await;
                }
                log::info!("(run_loop) task_id={} reanudada", task.id);
            }

            let outcome = self.sender.deliver_to(&out, *gid, retry).await?;

            let (index, total) = self.store.record_progress(&task.id, outcome.status).await?;
            self.audit(
                &task.id,
                TaskEventKind::Progress,
                &format!("{}/{}", index, total),
                json!({ "gid": gid, "status": outcome.status.as_str() }),
            )
            .await;

            if pos + 1 < remaining.len() {
                let wait = self.limiter.delay(task.delay_ms);
                if !wait.is_zero() && handle.sleep_unless_stopped(wait).await {
                    log::info!("(run_loop) task_id={} stop durante la espera", task.id);
                }
            }
        }

        self.store.finalize(&task.id, TaskStatus::Done).await?;
        self.audit(&task.id, TaskEventKind::Finished, "task_done", json!({}))
            .await;
        Ok(TaskStatus::Done)
    }

    /// Lee los flags del Store. Si el Store falla se usa la última señal del canal.
    async fn read_control(&self, task_id: &str, handle: &ControlHandle) -> Result<ControlSignal> {
        match self.store.get_task(task_id).await {
            Ok(Some(task)) => Ok(ControlSignal::from(&task)),
            Ok(None) => Err(anyhow!("task_id={} ya no existe en el store", task_id)),
            Err(e) => {
                log::warn!(
                    "(read_control) No se pudo leer task_id={}, usando el canal: {:?}",
                    task_id,
                    e
                );
                Ok(handle.current())
            }
        }
    }

    async fn finish_stopped(&self, task_id: &str) -> Result<TaskStatus> {
        log::info!("(finish_stopped) task_id={} detenida", task_id);
        self.store.finalize(task_id, TaskStatus::Stopped).await?;
        self.audit(task_id, TaskEventKind::Stopped, "task_stopped", json!({}))
            .await;
        Ok(TaskStatus::Stopped)
    }

    /// Escritura de auditoría best-effort: un fallo se loguea y el bucle sigue.
    async fn audit(&self, task_id: &str, kind: TaskEventKind, detail: &str, meta: serde_json::Value) {
        if let Err(e) = self.store.append_event(task_id, kind, detail, meta).await {
            log::warn!(
                "(audit) No se pudo registrar '{}' para task_id={}: {:?}",
                kind.as_str(),
                task_id,
                e
            );
        }
    }
}
