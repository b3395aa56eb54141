//! services/rate_limiter.rs
//! Calcula la espera entre envíos consecutivos, con jitter.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    min_ms: u64,
    jitter_pct: f64,
}

impl RateLimiter {
    pub fn new(min_ms: u64, jitter_pct: f64) -> Self {
        RateLimiter {
            min_ms,
            jitter_pct: jitter_pct.max(0.0),
        }
    }

    /// Sin mínimo ni jitter: el caso de /api/test-send
    pub fn disabled() -> Self {
        RateLimiter::new(0, 0.0)
    }

    pub fn delay_ms(&self, requested_ms: u64) -> u64 {
        delay_ms(requested_ms, self.min_ms, self.jitter_pct)
    }

    pub fn delay(&self, requested_ms: u64) -> Duration {
        Duration::from_millis(self.delay_ms(requested_ms))
    }
}

/// `base = max(requested, min)`, resultado `base + uniform(-j, j) * base`, nunca negativo.
pub fn delay_ms(requested_ms: u64, min_ms: u64, jitter_pct: f64) -> u64 {
    let base = requested_ms.max(min_ms) as f64;
    if base <= 0.0 {
        return 0;
    }
    let jitter_pct = jitter_pct.max(0.0);
    let jitter = if jitter_pct > 0.0 {
        rand::thread_rng().gen_range(-jitter_pct..=jitter_pct) * base
    } else {
        0.0
    };
    // Enteros dentro de [base*(1-j), base*(1+j)]; base siempre cae ahí
    let lo = (base * (1.0 - jitter_pct)).max(0.0).ceil();
    let hi = (base * (1.0 + jitter_pct)).floor();
    (base + jitter).round().clamp(lo, hi) as u64
}
