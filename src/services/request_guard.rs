//! services/request_guard.rs
//! Idempotencia y anti-martilleo en los endpoints que disparan envíos.
//! No afecta a tareas que ya están corriendo.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Duplicate,
    TooFrequent,
}

#[derive(Debug, Default)]
struct GuardState {
    request_ids: HashMap<String, Instant>,
    last_by_token: HashMap<String, Instant>,
}

#[derive(Debug)]
pub struct RequestGuard {
    min_spacing: Duration,
    id_ttl: Duration,
    state: Mutex<GuardState>,
}

impl RequestGuard {
    pub fn new(min_spacing_ms: u64, id_ttl_secs: u64) -> Self {
        RequestGuard {
            min_spacing: Duration::from_millis(min_spacing_ms),
            id_ttl: Duration::from_secs(id_ttl_secs),
            state: Mutex::new(GuardState::default()),
        }
    }

    pub async fn admit(&self, token: &str, request_id: Option<&str>) -> Admission {
        self.admit_at(token, request_id, Instant::now()).await
    }

    pub(crate) async fn admit_at(
        &self,
        token: &str,
        request_id: Option<&str>,
        now: Instant,
    ) -> Admission {
        let mut state = self.state.lock().await;

        let ttl = self.id_ttl;
        state
            .request_ids
            .retain(|_, ts| now.saturating_duration_since(*ts) <= ttl);
        let keep_tokens = ttl.max(self.min_spacing);
        state
            .last_by_token
            .retain(|_, ts| now.saturating_duration_since(*ts) <= keep_tokens);

        let request_id = request_id.filter(|id| !id.is_empty());
        if let Some(id) = request_id {
            if state.request_ids.contains_key(id) {
                return Admission::Duplicate;
            }
        }

        // El espaciado se mide desde el último request aceptado
        let too_soon = state
            .last_by_token
            .get(token)
            .map(|last| now.saturating_duration_since(*last) < self.min_spacing)
            .unwrap_or(false);
        if too_soon {
            return Admission::TooFrequent;
        }

        state.last_by_token.insert(token.to_string(), now);
        if let Some(id) = request_id {
            state.request_ids.insert(id.to_string(), now);
        }
        Admission::Allow
    }
}
