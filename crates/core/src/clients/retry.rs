use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Failure classification for a retried operation. Permanent failures stop
/// the loop immediately; transient ones back off and try again.
pub enum Attempt<E> {
    Permanent(E),
    Transient(E),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Exponential backoff with full jitter, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis().max(1) as u64);
        Duration::from_millis(jitter_ms)
    }
}

/// Runs `op` until it succeeds, fails permanently, or the attempt budget is
/// spent. The final transient error is returned when the budget runs out.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(Attempt::Permanent(e)) => return Err(e),
            Err(Attempt::Transient(e)) => {
                attempt += 1;
                if attempt >= policy.attempts {
                    return Err(e);
                }
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, 1);
        let result: Result<u32, &str> = with_backoff(&policy, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Attempt::Transient("not yet"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn permanent_failure_short_circuits() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, 1);
        let result: Result<(), &str> = with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Attempt::Permanent("no")) }
        })
        .await;
        assert_eq!(result, Err("no"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(3, 1);
        let result: Result<(), &str> =
            with_backoff(&policy, |_| async { Err(Attempt::Transient("down")) }).await;
        assert_eq!(result, Err("down"));
    }
}
