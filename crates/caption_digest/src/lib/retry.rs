use std::{fmt, future::Future, time::Duration};

use rand::Rng;

use crate::{
    config::RetryConfig,
    error::{AcquisitionFailure, SummarizationFailure},
};

/// A failure that knows whether repeating the same call may succeed.
pub trait Retryable: fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SummarizationFailure {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl Retryable for AcquisitionFailure {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt bound is reached. `op` receives the 1-based attempt number.
pub async fn with_backoff<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(failure) if failure.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "Transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(failure) => return Err(failure),
        }
    }
}

/// Exponential delay for the given attempt, capped at `max_delay`, plus up to
/// 50% random jitter.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = config
        .base_delay
        .saturating_mul(1 << exp)
        .min(config.max_delay);

    let jitter_ms = (delay.as_millis() as u64) / 2;
    if jitter_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        error::{AcquisitionFailureKind, SummarizationFailureKind},
        types::CaptionSourceKind,
    };

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(&fast(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(SummarizationFailure::transient("503"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&fast(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SummarizationFailure::transient("timeout")) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind, SummarizationFailureKind::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_failures_return_immediately() {
        for kind in [
            SummarizationFailureKind::Unauthorized,
            SummarizationFailureKind::QuotaExceeded,
            SummarizationFailureKind::MalformedResponse,
        ] {
            let calls = AtomicU32::new(0);
            let result: Result<(), _> = with_backoff(&fast(5), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(SummarizationFailure::new(kind, "nope")) }
            })
            .await;

            assert_eq!(result.unwrap_err().kind, kind);
            assert_eq!(calls.load(Ordering::SeqCst), 1, "{kind}");
        }
    }

    #[tokio::test]
    async fn caption_failures_retry_only_network_errors() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(&fast(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 1 {
                    Err(AcquisitionFailure::transient(
                        CaptionSourceKind::EmbeddedTranscript,
                        "connection reset",
                    ))
                } else {
                    Ok("captions")
                }
            }
        })
        .await;
        assert_eq!(result, Ok("captions"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&fast(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AcquisitionFailure::new(
                    CaptionSourceKind::PlatformCaptions,
                    AcquisitionFailureKind::QuotaExceeded,
                    "quotaExceeded",
                ))
            }
        })
        .await;
        assert_eq!(result.unwrap_err().kind, AcquisitionFailureKind::QuotaExceeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        };

        let first = backoff_delay(&config, 1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));

        let third = backoff_delay(&config, 3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(600));

        let tenth = backoff_delay(&config, 10);
        assert!(tenth >= Duration::from_millis(1_000) && tenth <= Duration::from_millis(1_500));
    }
}
