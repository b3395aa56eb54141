//! tests/guard_tests.rs
//! Pruebas de DedupGuard, RateLimiter, RetryPolicy y RequestGuard.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use actix_rt::test;

    use crate::services::dedup_guard::{fingerprint, DedupGuard};
    use crate::services::delivery_client::DeliveryResult;
    use crate::services::rate_limiter::{delay_ms, RateLimiter};
    use crate::services::request_guard::{Admission, RequestGuard};
    use crate::services::retry_policy::RetryPolicy;

    const WINDOW: Duration = Duration::from_secs(120);

    #[test]
    async fn test_fingerprint_depends_on_flags() {
        let a = fingerprint("hola", "plain", true);
        assert_eq!(a.len(), 16);
        assert_eq!(a, fingerprint("hola", "plain", true));
        assert_ne!(a, fingerprint("hola", "html", true));
        assert_ne!(a, fingerprint("hola", "plain", false));
        assert_ne!(a, fingerprint("hola!", "plain", true));
    }

    #[test]
    async fn test_dedup_skips_within_window_without_touching_timestamp() {
        let guard = DedupGuard::new();
        let t0 = Instant::now();

        assert!(!guard.should_skip_at("main", -100, "msg", "plain", true, WINDOW, t0).await);
        let first = guard.last_sent("main", -100, "msg", "plain", true).await;
        assert_eq!(first, Some(t0));

        let t1 = t0 + Duration::from_secs(30);
        assert!(guard.should_skip_at("main", -100, "msg", "plain", true, WINDOW, t1).await);
        assert_eq!(guard.last_sent("main", -100, "msg", "plain", true).await, Some(t0));

        // Otra cuenta, otro destinatario u otro formato no se suprimen
        assert!(!guard.should_skip_at("alt", -100, "msg", "plain", true, WINDOW, t1).await);
        assert!(!guard.should_skip_at("main", -200, "msg", "plain", true, WINDOW, t1).await);
        assert!(!guard.should_skip_at("main", -100, "msg", "html", true, WINDOW, t1).await);
    }

    #[test]
    async fn test_dedup_allows_after_window_and_prunes_old_entries() {
        let guard = DedupGuard::new();
        let t0 = Instant::now();

        assert!(!guard.should_skip_at("main", 1, "msg", "plain", true, WINDOW, t0).await);
        assert!(!guard.should_skip_at("main", 2, "otro", "plain", true, WINDOW, t0).await);

        let t1 = t0 + WINDOW + Duration::from_secs(1);
        assert!(!guard.should_skip_at("main", 1, "msg", "plain", true, WINDOW, t1).await);
        assert_eq!(guard.last_sent("main", 1, "msg", "plain", true).await, Some(t1));

        // Pasadas dos ventanas desde t0, la entrada de (2, "otro") se poda
        let t2 = t0 + WINDOW * 2 + Duration::from_secs(1);
        assert!(!guard.should_skip_at("main", 3, "msg", "plain", true, WINDOW, t2).await);
        assert_eq!(guard.last_sent("main", 2, "otro", "plain", true).await, None);
        assert_eq!(guard.len().await, 2);
    }

    #[test]
    async fn test_rate_limiter_bounds() {
        // 947 * 0.9 = 852.3 y 947 * 1.1 = 1041.7: cotas con parte fraccionaria
        for (requested, min, jitter) in [
            (1000, 1500, 0.15),
            (3000, 1500, 0.5),
            (800, 0, 0.2),
            (947, 0, 0.1),
        ] {
            let base = (requested as u64).max(min) as f64;
            let lo = (base * (1.0 - jitter)).max(0.0).ceil() as u64;
            let hi = (base * (1.0 + jitter)).floor() as u64;
            for _ in 0..2000 {
                let d = delay_ms(requested, min, jitter);
                assert!(d >= lo && d <= hi, "{} fuera de [{}, {}]", d, lo, hi);
            }
        }
    }

    #[test]
    async fn test_rate_limiter_without_jitter_is_exact() {
        assert_eq!(delay_ms(0, 0, 0.3), 0);
        assert_eq!(delay_ms(200, 1500, 0.0), 1500);
        assert_eq!(RateLimiter::new(1500, 0.0).delay_ms(2500), 2500);
        assert_eq!(RateLimiter::disabled().delay(0), Duration::ZERO);
    }

    #[test]
    async fn test_retry_stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, 0);

        let outcome = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        DeliveryResult::failure("timeout")
                    } else {
                        DeliveryResult::success(77)
                    }
                }
            })
            .await;

        assert!(outcome.result.ok);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    async fn test_retry_zero_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, 10_000);
        let started = Instant::now();

        let outcome = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DeliveryResult::failure("bloqueado") }
            })
            .await;

        assert!(!outcome.result.ok);
        assert_eq!(outcome.result.error.as_deref(), Some("bloqueado"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Sin espera después del último intento
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    async fn test_retry_caps_attempts_at_retry_max_plus_one() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, 1);

        let outcome = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DeliveryResult::failure("flood") }
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    async fn test_request_guard_duplicate_and_spacing() {
        let guard = RequestGuard::new(500, 60);
        let t0 = Instant::now();

        assert_eq!(guard.admit_at("tok", Some("req-1"), t0).await, Admission::Allow);
        assert_eq!(
            guard
                .admit_at("tok", Some("req-1"), t0 + Duration::from_secs(2))
                .await,
            Admission::Duplicate
        );

        let t1 = t0 + Duration::from_secs(3);
        assert_eq!(guard.admit_at("tok", None, t1).await, Admission::Allow);
        assert_eq!(
            guard
                .admit_at("tok", None, t1 + Duration::from_millis(100))
                .await,
            Admission::TooFrequent
        );
        // Otro token no comparte el espaciado
        assert_eq!(
            guard
                .admit_at("otro", None, t1 + Duration::from_millis(100))
                .await,
            Admission::Allow
        );
    }

    #[test]
    async fn test_request_guard_spacing_counts_from_last_accepted() {
        let guard = RequestGuard::new(500, 60);
        let t0 = Instant::now();

        assert_eq!(guard.admit_at("tok", None, t0).await, Admission::Allow);
        assert_eq!(
            guard
                .admit_at("tok", None, t0 + Duration::from_millis(400))
                .await,
            Admission::TooFrequent
        );
        // 800ms desde el último aceptado, aunque solo 400ms desde el rechazo
        assert_eq!(
            guard
                .admit_at("tok", None, t0 + Duration::from_millis(800))
                .await,
            Admission::Allow
        );
        assert_eq!(
            guard
                .admit_at("tok", None, t0 + Duration::from_millis(900))
                .await,
            Admission::TooFrequent
        );
    }

    #[test]
    async fn test_request_guard_forgets_ids_after_ttl() {
        let guard = RequestGuard::new(500, 60);
        let t0 = Instant::now();

        assert_eq!(guard.admit_at("tok", Some("abc"), t0).await, Admission::Allow);
        let later = t0 + Duration::from_secs(61);
        assert_eq!(guard.admit_at("tok", Some("abc"), later).await, Admission::Allow);
    }

    #[test]
    async fn test_request_guard_rejected_request_keeps_id_usable() {
        let guard = RequestGuard::new(500, 60);
        let t0 = Instant::now();

        assert_eq!(guard.admit_at("tok", Some("a"), t0).await, Admission::Allow);
        let t1 = t0 + Duration::from_millis(100);
        assert_eq!(guard.admit_at("tok", Some("b"), t1).await, Admission::TooFrequent);
        let t2 = t1 + Duration::from_secs(1);
        assert_eq!(guard.admit_at("tok", Some("b"), t2).await, Admission::Allow);
    }
}
