//! tests/support.rs
//! Piezas comunes de los tests: SQLite en memoria y un cliente de entrega falso.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tokio::sync::Notify;

use crate::models::task_model::NewTask;
use crate::services::{
    dedup_guard::DedupGuard,
    delivery_client::{DeliveryClient, DeliveryResult},
    rate_limiter::RateLimiter,
    recovery_service::RecoveryService,
    send_log_service::SendLogService,
    send_service::SendService,
    task_control::ControlRegistry,
    task_runner::TaskRunner,
    task_service::TaskService,
    task_store::TaskStore,
};

/// Una sola conexión: cada conexión `:memory:` sería una base distinta.
pub async fn memory_pool() -> Pool<Sqlite> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("No se pudo abrir SQLite en memoria")
}

/// Envío bloqueado hasta que el test lo libere
struct Gate {
    group_id: i64,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[derive(Default)]
pub struct FakeClient {
    calls: Mutex<Vec<i64>>,
    /// group_id -> fallos restantes antes de tener éxito (u32::MAX = siempre falla)
    failures: Mutex<HashMap<i64, u32>>,
    untitled: Mutex<HashSet<i64>>,
    gate: Mutex<Option<Gate>>,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<i64> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_times(&self, group_id: i64, times: u32) {
        self.failures.lock().unwrap().insert(group_id, times);
    }

    pub fn always_fail(&self, group_id: i64) {
        self.fail_times(group_id, u32::MAX);
    }

    pub fn without_title(&self, group_id: i64) {
        self.untitled.lock().unwrap().insert(group_id);
    }

    /// Bloquea el envío a `group_id`. Devuelve (started, release).
    pub fn block_on(&self, group_id: i64) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Gate {
            group_id,
            started: started.clone(),
            release: release.clone(),
        });
        (started, release)
    }
}

#[async_trait]
impl DeliveryClient for FakeClient {
    async fn send(
        &self,
        _account: &str,
        group_id: i64,
        _text: &str,
        _parse_mode: &str,
        _disable_preview: bool,
    ) -> DeliveryResult {
        self.calls.lock().unwrap().push(group_id);

        let gate = {
            let guard = self.gate.lock().unwrap();
            guard
                .as_ref()
                .filter(|g| g.group_id == group_id)
                .map(|g| (g.started.clone(), g.release.clone()))
        };
        if let Some((started, release)) = gate {
            started.notify_one();
            release.notified().await;
        }

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&group_id) {
                Some(left) if *left == u32::MAX => true,
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };

        if should_fail {
            DeliveryResult::failure(format!("flood_wait en {}", group_id))
        } else {
            DeliveryResult::success(1000 + group_id)
        }
    }

    async fn resolve_title(&self, _account: &str, group_id: i64) -> Result<String> {
        if self.untitled.lock().unwrap().contains(&group_id) {
            return Err(anyhow!("chat not found"));
        }
        Ok(format!("Grupo {}", group_id))
    }
}

/// Todo el núcleo armado como en main (por defecto sin esperas de rate limit).
pub struct Harness {
    pub pool: Pool<Sqlite>,
    pub store: TaskStore,
    pub logs: SendLogService,
    pub client: Arc<FakeClient>,
    pub dedup: Arc<DedupGuard>,
    pub controls: Arc<ControlRegistry>,
    pub sender: SendService,
    pub runner: TaskRunner,
    pub tasks: TaskService,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_limiter(RateLimiter::disabled()).await
    }

    /// Igual que `new` pero con el rate limiter que usará el runner
    pub async fn with_limiter(limiter: RateLimiter) -> Self {
        let pool = memory_pool().await;
        let store = TaskStore::new(pool.clone());
        store.run_migrations().await.expect("migraciones");
        let logs = SendLogService::new(pool.clone());
        let client = FakeClient::new();
        let dedup = Arc::new(DedupGuard::new());
        let controls = Arc::new(ControlRegistry::new());

        let sender = SendService::new(
            client.clone(),
            dedup.clone(),
            logs.clone(),
            Duration::from_secs(120),
            200,
        );
        let runner = TaskRunner::new(
            store.clone(),
            sender.clone(),
            controls.clone(),
            limiter,
            Duration::from_millis(20),
        );
        let tasks = TaskService::new(store.clone(), runner.clone(), controls.clone());

        Harness {
            pool,
            store,
            logs,
            client,
            dedup,
            controls,
            sender,
            runner,
            tasks,
        }
    }

    pub fn recovery(&self) -> RecoveryService {
        RecoveryService::new(self.store.clone(), self.runner.clone(), 100)
    }

    /// group_id de cada fila de send_logs, en orden de inserción
    pub async fn logged_groups(&self) -> Vec<i64> {
        let mut rows = self.logs.recent(1000, None).await.expect("send_logs");
        rows.reverse();
        rows.into_iter().map(|r| r.group_id).collect()
    }

    pub async fn event_names(&self, task_id: &str) -> Vec<String> {
        let page = self
            .store
            .list_events(task_id, 1, 1000)
            .await
            .expect("task_events");
        page.items.into_iter().rev().map(|e| e.event).collect()
    }
}

pub fn new_task(group_ids: Vec<i64>) -> NewTask {
    NewTask {
        account: "main".to_string(),
        message: "Hola a todos".to_string(),
        parse_mode: "plain".to_string(),
        disable_preview: true,
        delay_ms: 0,
        retry_max: 0,
        retry_delay_ms: 0,
        group_ids,
        request_id: None,
    }
}
