//! services/task_service.rs
//! Entrada de alto nivel para tareas: crear, controlar y consultar.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::models::task_model::{
    ControlAction, NewTask, TaskEventKind, TaskEventsPage, TaskStatus, TaskStatusResponse,
};
use crate::services::{
    task_control::ControlRegistry, task_runner::TaskRunner, task_store::TaskStore,
};

#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
    runner: TaskRunner,
    controls: Arc<ControlRegistry>,
}

impl TaskService {
    pub fn new(store: TaskStore, runner: TaskRunner, controls: Arc<ControlRegistry>) -> Self {
        Self {
            store,
            runner,
            controls,
        }
    }

    /// Persiste la tarea (con su evento `created`) y arranca el runner.
    pub async fn create_task(&self, new_task: NewTask) -> Result<(String, JoinHandle<TaskStatus>)> {
        let task_id = self.store.create_task(&new_task).await?;
        log::info!(
            "(create_task) task_id={} account={} destinatarios={}",
            task_id,
            new_task.account,
            new_task.group_ids.len()
        );

        let task = self
            .store
            .get_task(&task_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("task_id={} recién creada no se encuentra", task_id))?;
        let handle = self.runner.launch(task).await;
        Ok((task_id, handle))
    }

    /// Escribe el flag en el Store, deja el evento y avisa al runner si está vivo.
    /// Devuelve false si la tarea no existe.
    pub async fn control(&self, task_id: &str, action: ControlAction) -> Result<bool> {
        let (found, kind, detail) = match action {
            ControlAction::Pause => (
                self.store.set_paused(task_id, true).await?,
                TaskEventKind::Paused,
                "task_paused",
            ),
            ControlAction::Resume => (
                self.store.set_paused(task_id, false).await?,
                TaskEventKind::Resumed,
                "task_resumed",
            ),
            ControlAction::Stop => (
                self.store.request_stop(task_id).await?,
                TaskEventKind::StopRequested,
                "task_stop_requested",
            ),
        };
        if !found {
            return Ok(false);
        }

        self.store
            .append_event(task_id, kind, detail, json!({}))
            .await?;
        let live = self.controls.publish(task_id, action).await;
        log::info!(
            "(control) task_id={} acción={:?} runner_vivo={}",
            task_id,
            action,
            live
        );
        Ok(true)
    }

    pub async fn status(&self, task_id: &str) -> Result<Option<TaskStatusResponse>> {
        let task = self.store.get_task(task_id).await?;
        Ok(task.as_ref().map(TaskStatusResponse::from))
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<TaskStatusResponse>> {
        let tasks = self.store.list_tasks(limit).await?;
        Ok(tasks.iter().map(TaskStatusResponse::from).collect())
    }

    pub async fn events(&self, task_id: &str, page: u64, size: u64) -> Result<TaskEventsPage> {
        self.store.list_events(task_id, page, size).await
    }
}
