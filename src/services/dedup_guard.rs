//! services/dedup_guard.rs
//! Evita reenviar el mismo mensaje al mismo destinatario dentro de una ventana.
//! Estado solo en memoria: se pierde al reiniciar el proceso.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Hash corto de (parse_mode, flag de preview, texto)
pub fn fingerprint(message: &str, parse_mode: &str, disable_preview: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parse_mode.as_bytes());
    hasher.update(b"|");
    hasher.update(if disable_preview { b"1" } else { b"0" });
    hasher.update(b"|");
    hasher.update(message.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(16);
    digest
}

fn dedup_key(account: &str, recipient: i64, fp: &str) -> String {
    format!("{}:{}:{}", account, recipient, fp)
}

#[derive(Debug, Default)]
pub struct DedupGuard {
    entries: Mutex<HashMap<String, Instant>>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// true = suprimir el envío. Si no se suprime, registra `now` para la clave.
    pub async fn should_skip(
        &self,
        account: &str,
        recipient: i64,
        message: &str,
        parse_mode: &str,
        disable_preview: bool,
        window: Duration,
    ) -> bool {
        self.should_skip_at(
            account,
            recipient,
            message,
            parse_mode,
            disable_preview,
            window,
            Instant::now(),
        )
        .await
    }

    pub(crate) async fn should_skip_at(
        &self,
        account: &str,
        recipient: i64,
        message: &str,
        parse_mode: &str,
        disable_preview: bool,
        window: Duration,
        now: Instant,
    ) -> bool {
        let key = dedup_key(
            account,
            recipient,
            &fingerprint(message, parse_mode, disable_preview),
        );

        let mut entries = self.entries.lock().await;
        let horizon = window * 2;
        entries.retain(|_, ts| now.saturating_duration_since(*ts) <= horizon);

        if let Some(last) = entries.get(&key) {
            if now.saturating_duration_since(*last) < window {
                return true;
            }
        }
        entries.insert(key, now);
        false
    }

    #[cfg(test)]
    /// Último envío registrado para la clave (None si no hay o ya se podó)
    pub async fn last_sent(
        &self,
        account: &str,
        recipient: i64,
        message: &str,
        parse_mode: &str,
        disable_preview: bool,
    ) -> Option<Instant> {
        let key = dedup_key(
            account,
            recipient,
            &fingerprint(message, parse_mode, disable_preview),
        );
        self.entries.lock().await.get(&key).copied()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
