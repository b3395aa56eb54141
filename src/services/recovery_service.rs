//! services/recovery_service.rs
//! Al arrancar, relanza las tareas que quedaron en "running" desde su último índice.
//! El destinatario que estaba en vuelo durante la caída puede procesarse dos veces.

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::models::task_model::TaskStatus;
use crate::services::{task_runner::TaskRunner, task_store::TaskStore};

#[derive(Clone)]
pub struct RecoveryService {
    store: TaskStore,
    runner: TaskRunner,
    scan_limit: i64,
}

impl RecoveryService {
    pub fn new(store: TaskStore, runner: TaskRunner, scan_limit: i64) -> Self {
        Self {
            store,
            runner,
            scan_limit,
        }
    }

    pub async fn resume_running_tasks(&self) -> Result<Vec<(String, JoinHandle<TaskStatus>)>> {
        let tasks = self.store.list_running(self.scan_limit).await?;
        log::info!(
            "(resume_running_tasks) {} tareas en 'running' por recuperar",
            tasks.len()
        );

        let mut launched = Vec::with_capacity(tasks.len());
        for task in tasks {
            log::info!(
                "(resume_running_tasks) Relanzando task_id={} en índice {}/{} (pendientes={}, paused={}, stop={})",
                task.id,
                task.current_index,
                task.total,
                task.remaining().len(),
                task.paused,
                task.stop_requested
            );
            let task_id = task.id.clone();
            let handle = self.runner.launch(task).await;
            launched.push((task_id, handle));
        }
        Ok(launched)
    }
}
