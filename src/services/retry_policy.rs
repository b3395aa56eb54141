//! services/retry_policy.rs
//! Reintentos por destinatario alrededor de una llamada al cliente de entrega.

use std::future::Future;
use std::time::Duration;

use crate::services::delivery_client::DeliveryResult;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Reintentos además del primer intento (0 = un solo intento)
    pub retry_max: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub result: DeliveryResult,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(retry_max: u32, retry_delay_ms: u64) -> Self {
        RetryPolicy {
            retry_max,
            retry_delay: Duration::from_millis(retry_delay_ms),
        }
    }

    /// Ejecuta `attempt` hasta `retry_max + 1` veces, parando en el primer ok.
    /// Espera `retry_delay` entre intentos, nunca después del último.
    /// Solo se devuelve el último resultado; los intermedios no se auditan.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DeliveryResult>,
    {
        let max_attempts = self.retry_max.saturating_add(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = attempt().await;
            if result.ok || attempts >= max_attempts {
                return RetryOutcome { result, attempts };
            }
            log::debug!(
                "(retry_policy) intento {}/{} falló: {:?}",
                attempts,
                max_attempts,
                result.error
            );
            if !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }
}
