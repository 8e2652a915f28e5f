use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: base, 2x base, 4x base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects, or
/// `policy.max_retries` retries have been spent.
pub async fn retry<T, E, Op, Fut, P>(policy: &RetryPolicy, should_retry: P, mut op: Op) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && should_retry(&err) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "⚠️ Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt + 1,
                    policy.max_retries + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_double_each_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry(&RetryPolicy::default(), AiError::is_retryable, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AiError::Http { status: 429, body: String::new() })
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // two sleeps: 1s + 2s
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), AiError> = retry(&RetryPolicy::default(), AiError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AiError::Http { status: 400, body: "bad".into() }) }
        })
        .await;

        assert!(matches!(result, Err(AiError::Http { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<(), AiError> = retry(&RetryPolicy::default(), AiError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AiError::Http { status: 503, body: String::new() }) }
        })
        .await;

        assert!(matches!(result, Err(AiError::Http { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
