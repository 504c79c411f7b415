//! Retry and backoff for sink hand-offs.
//!
//! Only the hand-off of a single file is retried, and only for transient
//! errors. A job as a whole is never retried automatically.

use async_trait::async_trait;
use std::time::Duration;

use super::{DeliveryFile, DeliverySink};
use crate::config::DeliveryConfig;
use crate::error::SinkError;
use crate::job::SinkId;

/// High-level classification of a sink error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Hand-off timed out.
    Timeout,
    /// Sink asked us to slow down, optionally saying for how long.
    Throttled(Option<Duration>),
    /// Sink temporarily unreachable.
    Unavailable,
    /// Anything else (not retried).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound on computed backoff. A sink-provided `retry_after` is honoured as is.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &DeliveryConfig) -> Self {
        let max_delay = Duration::from_secs(cfg.max_delay_secs);
        // Negative or NaN means no delay; out of range means the cap.
        let base_delay = if cfg.base_delay_secs > 0.0 {
            Duration::try_from_secs_f64(cfg.base_delay_secs)
                .map_or(max_delay, |d| d.min(max_delay))
        } else {
            Duration::ZERO
        };
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// `attempt` is 1-based (1 = first attempt).
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        match kind {
            ErrorKind::Other => RetryDecision::NoRetry,
            ErrorKind::Throttled(Some(after)) => RetryDecision::RetryAfter(after),
            ErrorKind::Timeout | ErrorKind::Unavailable | ErrorKind::Throttled(None) => {
                // base * 2^(attempt-1), capped.
                let exp = 1u32 << attempt.saturating_sub(1).min(8);
                let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

pub fn classify(e: &SinkError) -> ErrorKind {
    match e {
        SinkError::Throttled { retry_after } => ErrorKind::Throttled(*retry_after),
        SinkError::Timeout => ErrorKind::Timeout,
        SinkError::Unavailable(_) => ErrorKind::Unavailable,
        SinkError::Rejected(_) | SinkError::Io(_) => ErrorKind::Other,
    }
}

/// Wraps a sink and retries transient hand-off failures with backoff.
pub struct RetryingSink<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingSink<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: DeliverySink> DeliverySink for RetryingSink<S> {
    async fn send(&self, sink: SinkId, file: &DeliveryFile) -> Result<(), SinkError> {
        let mut attempt = 1u32;
        loop {
            match self.inner.send(sink, file).await {
                Ok(()) => return Ok(()),
                Err(e) => match self.policy.decide(attempt, classify(&e)) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(
                            sink,
                            segment = file.index,
                            attempt,
                            delay_ms = d.as_millis() as u64,
                            "sink hand-off failed, retrying: {}",
                            e
                        );
                        tokio::time::sleep(d).await;
                        attempt += 1;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails with the queued errors, then succeeds.
    struct Flaky {
        errors: Mutex<Vec<SinkError>>,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(mut errors: Vec<SinkError>) -> Self {
            errors.reverse();
            Self {
                errors: Mutex::new(errors),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DeliverySink for Flaky {
        async fn send(&self, _sink: SinkId, _file: &DeliveryFile) -> Result<(), SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.errors.lock().unwrap().pop() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    fn file() -> DeliveryFile {
        DeliveryFile::new(PathBuf::from("x.mp4"), 0, 1, None)
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }

    #[test]
    fn no_retry_for_other() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Other), RetryDecision::NoRetry);
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = policy(20);
        let d = |n| match p.decide(n, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry"),
        };
        assert_eq!(d(1), Duration::from_millis(250));
        assert_eq!(d(2), Duration::from_millis(500));
        assert_eq!(d(10), p.max_delay);
    }

    #[test]
    fn throttle_hint_is_honoured() {
        let p = policy(3);
        assert_eq!(
            p.decide(1, ErrorKind::Throttled(Some(Duration::from_secs(42)))),
            RetryDecision::RetryAfter(Duration::from_secs(42))
        );
        assert_eq!(
            p.decide(3, ErrorKind::Throttled(Some(Duration::from_secs(42)))),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn classify_sink_errors() {
        assert_eq!(classify(&SinkError::Timeout), ErrorKind::Timeout);
        assert_eq!(
            classify(&SinkError::Unavailable("down".into())),
            ErrorKind::Unavailable
        );
        assert_eq!(classify(&SinkError::Rejected("too big".into())), ErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let sink = RetryingSink::new(
            Flaky::new(vec![
                SinkError::Timeout,
                SinkError::Throttled {
                    retry_after: Some(Duration::from_secs(5)),
                },
            ]),
            policy(5),
        );
        sink.send(1, &file()).await.unwrap();
        assert_eq!(sink.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_not_retried() {
        let sink = RetryingSink::new(Flaky::new(vec![SinkError::Rejected("no".into())]), policy(5));
        let err = sink.send(1, &file()).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert_eq!(sink.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let sink = RetryingSink::new(
            Flaky::new(vec![
                SinkError::Timeout,
                SinkError::Timeout,
                SinkError::Timeout,
            ]),
            policy(2),
        );
        assert!(matches!(sink.send(1, &file()).await, Err(SinkError::Timeout)));
        assert_eq!(sink.inner().calls.load(Ordering::SeqCst), 2);
    }
}
