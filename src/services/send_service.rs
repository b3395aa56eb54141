//! services/send_service.rs
//! Pipeline por destinatario: dedup -> reintentos -> título -> send_log.
//! Lo usan tanto el envío síncrono (/api/send, /api/test-send) como el runner de tareas.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::models::send_log_model::{NewSendLog, SendStatus};
use crate::models::send_model::SendSummary;
use crate::services::{
    dedup_guard::DedupGuard, delivery_client::DeliveryClient, rate_limiter::RateLimiter,
    retry_policy::RetryPolicy, send_log_service::SendLogService,
};

/// Mensaje a entregar, igual para todos los destinatarios
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub account: String,
    pub message: String,
    pub parse_mode: String,
    pub disable_preview: bool,
}

#[derive(Debug, Clone)]
pub struct RecipientOutcome {
    pub group_id: i64,
    pub status: SendStatus,
    pub error: Option<String>,
    pub message_id: Option<i64>,
    /// Intentos reales contra el cliente (0 si se omitió por dedup)
    pub attempts: u32,
}

#[derive(Clone)]
pub struct SendService {
    client: Arc<dyn DeliveryClient>,
    dedup: Arc<DedupGuard>,
    logs: SendLogService,
    dedup_window: Duration,
    preview_chars: usize,
}

impl SendService {
    pub fn new(
        client: Arc<dyn DeliveryClient>,
        dedup: Arc<DedupGuard>,
        logs: SendLogService,
        dedup_window: Duration,
        preview_chars: usize,
    ) -> Self {
        Self {
            client,
            dedup,
            logs,
            dedup_window,
            preview_chars,
        }
    }

    /// Procesa un destinatario completo y deja exactamente una fila en send_logs.
    /// Solo falla si no se pudo escribir esa fila.
    pub async fn deliver_to(
        &self,
        out: &Outgoing,
        group_id: i64,
        retry: RetryPolicy,
    ) -> Result<RecipientOutcome> {
        let skipped = self
            .dedup
            .should_skip(
                &out.account,
                group_id,
                &out.message,
                &out.parse_mode,
                out.disable_preview,
                self.dedup_window,
            )
            .await;

        let outcome = if skipped {
            log::info!(
                "(deliver_to) group_id={} omitido: mismo mensaje dentro de la ventana de dedup",
                group_id
            );
            RecipientOutcome {
                group_id,
                status: SendStatus::Skipped,
                error: None,
                message_id: None,
                attempts: 0,
            }
        } else {
            let client = self.client.as_ref();
            let (account, message, parse_mode) = (
                out.account.as_str(),
                out.message.as_str(),
                out.parse_mode.as_str(),
            );
            let disable_preview = out.disable_preview;
            let run = retry
                .run(|| client.send(account, group_id, message, parse_mode, disable_preview))
                .await;

            if run.result.ok {
                RecipientOutcome {
                    group_id,
                    status: SendStatus::Success,
                    error: None,
                    message_id: run.result.message_id,
                    attempts: run.attempts,
                }
            } else {
                RecipientOutcome {
                    group_id,
                    status: SendStatus::Failed,
                    error: Some(run.result.error.unwrap_or_else(|| "send_failed".to_string())),
                    message_id: None,
                    attempts: run.attempts,
                }
            }
        };

        let title = self.resolve_title(&out.account, group_id).await;
        self.logs
            .insert(&NewSendLog {
                account: out.account.clone(),
                group_id,
                group_title: title,
                message_preview: preview(&out.message, self.preview_chars),
                status: outcome.status,
                error: outcome.error.clone(),
                message_id: outcome.message_id,
                parse_mode: out.parse_mode.clone(),
            })
            .await?;

        Ok(outcome)
    }

    /// Nunca falla: si no hay título se usa el id crudo.
    async fn resolve_title(&self, account: &str, group_id: i64) -> String {
        match self.client.resolve_title(account, group_id).await {
            Ok(title) if !title.trim().is_empty() => title,
            Ok(_) => group_id.to_string(),
            Err(e) => {
                log::debug!("(resolve_title) group_id={} sin título: {:?}", group_id, e);
                group_id.to_string()
            }
        }
    }

    /// Envío síncrono a toda la lista, sin tarea persistida.
    /// La espera entre destinatarios no se aplica después del último.
    pub async fn send_to_groups(
        &self,
        out: &Outgoing,
        group_ids: &[i64],
        delay_ms: u64,
        retry: RetryPolicy,
        limiter: RateLimiter,
    ) -> Result<SendSummary> {
        let mut summary = SendSummary {
            total: group_ids.len(),
            ..SendSummary::default()
        };

        for (idx, gid) in group_ids.iter().enumerate() {
            let outcome = self.deliver_to(out, *gid, retry).await?;
            match outcome.status {
                SendStatus::Success => summary.success += 1,
                SendStatus::Failed => summary.failed += 1,
                SendStatus::Skipped => summary.skipped += 1,
            }

            if idx + 1 < group_ids.len() {
                let wait = limiter.delay(delay_ms);
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
        }

        log::info!(
            "(send_to_groups) account={} total={} success={} failed={} skipped={}",
            out.account,
            summary.total,
            summary.success,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }
}

/// Primeros `max_chars` caracteres (no bytes)
pub fn preview(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}
