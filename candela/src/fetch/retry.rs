use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use candela_core::types::{BackoffConfig, CandelaConfig, CandelaError, MetricsCollector};

use crate::core::Candela;

/// Absolute expiry instant for one request, if a deadline is configured.
pub(crate) fn request_deadline(cfg: &CandelaConfig) -> Option<Instant> {
    cfg.request_timeout.map(|t| Instant::now() + t)
}

/// Whether the request deadline has passed.
pub(crate) fn deadline_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Per-call timeout: the provider timeout, shortened by whatever remains of
/// the request deadline.
pub(crate) fn per_call_timeout(provider_timeout: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(d) => provider_timeout.min(d.saturating_duration_since(Instant::now())),
        None => provider_timeout,
    }
}

/// Backoff before the retry following failure `attempt` (0-based), honoring a
/// server-provided rate-limit delay when present.
pub(crate) fn backoff_delay(cfg: &BackoffConfig, attempt: u32, err: &CandelaError) -> Duration {
    let base_ms = match err {
        CandelaError::RateLimited {
            retry_after_ms: Some(ms),
        } => *ms,
        _ => cfg
            .min_backoff_ms
            .saturating_mul(u64::from(cfg.factor).saturating_pow(attempt))
            .min(cfg.max_backoff_ms),
    };
    Duration::from_millis(jittered(base_ms, cfg.jitter_percent))
}

fn jittered(base_ms: u64, jitter_percent: u8) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, base_ms.saturating_mul(u64::from(jitter_percent)) / 100)
    };
    let mut rng = rand::rng();
    base_ms.saturating_add(rng.random_range(0..jitter_range))
}

/// Run `call` under the per-source timeout, retrying transient failures up to
/// `cfg.max_retries` times with jittered exponential backoff.
///
/// Only transient classes are retried; everything else returns on the first
/// failure. The optional `deadline` shortens each call's timeout and bounds
/// the backoff sleeps: when the next sleep would outlive it, the last error
/// returns immediately instead.
pub(crate) async fn with_retries<T, F, Fut>(
    cfg: &CandelaConfig,
    metrics: &dyn MetricsCollector,
    connector: &'static str,
    capability: &'static str,
    deadline: Option<Instant>,
    mut call: F,
) -> Result<T, CandelaError>
where
    F: FnMut() -> Fut,
    Fut: core::future::Future<Output = Result<T, CandelaError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let timeout = per_call_timeout(cfg.provider_timeout, deadline);
        let result =
            Candela::provider_call_with_timeout(connector, capability, timeout, call()).await;
        let err = match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < cfg.max_retries => e,
            Err(e) => return Err(e),
        };
        attempt += 1;
        metrics.record_retry(attempt);
        #[cfg(feature = "tracing")]
        tracing::debug!(connector, capability, attempt, error = %err, "retrying transient failure");
        let delay = backoff_delay(&cfg.backoff, attempt - 1, &err);
        if let Some(d) = deadline
            && Instant::now() + delay >= d
        {
            return Err(err);
        }
        tokio::time::sleep(delay).await;
    }
}
