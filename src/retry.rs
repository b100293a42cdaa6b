// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Retry Logic with Exponential Backoff
 * Re-fetch of scan results and requeue delays for reconciliation
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use crate::errors::{ScanError, ScanResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential)
    pub backoff_multiplier: f64,

    pub enable_jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            enable_jitter: true,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Requeue schedule for failed reconciliations: 5s doubling up to 5 minutes.
    pub fn requeue() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            enable_jitter: true,
            jitter_factor: 0.1,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    /// Calculate backoff duration for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        let capped_backoff = base_backoff.min(self.max_backoff.as_millis() as f64);

        let jitter_range = capped_backoff * self.jitter_factor;
        let backoff_with_jitter = if self.enable_jitter && jitter_range > 0.0 {
            let mut rng = rand::rng();
            let jitter = rng.random_range(-jitter_range..jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_millis(backoff_with_jitter as u64)
    }
}

/// Retry a future with exponential backoff.
///
/// Non-retryable errors are returned immediately; the last retryable error is
/// returned once attempts run out.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> ScanResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ScanResult<T>>,
{
    let mut attempt = 0;
    let mut last_error: Option<ScanError> = None;

    while attempt < config.max_attempts {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        attempt = attempt,
                        operation = operation_name,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                let is_retryable = err.is_retryable();

                warn!(
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    operation = operation_name,
                    error = %err,
                    retryable = is_retryable,
                    "Operation failed"
                );

                if !is_retryable {
                    return Err(err);
                }

                let custom_delay = err.retry_delay();
                last_error = Some(err);

                if attempt < config.max_attempts {
                    let backoff = custom_delay.unwrap_or_else(|| config.calculate_backoff(attempt));

                    debug!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        operation = operation_name,
                        "Backing off before retry"
                    );

                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ScanError::rejected(
            operation_name,
            format!("no attempt made (max_attempts = {})", config.max_attempts),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_calculation() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            enable_jitter: false,
            jitter_factor: 0.0,
        };

        assert_eq!(config.calculate_backoff(0), Duration::from_secs(0));
        assert_eq!(config.calculate_backoff(1), Duration::from_millis(100));
        assert_eq!(config.calculate_backoff(2), Duration::from_millis(200));
        assert_eq!(config.calculate_backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_requeue_schedule_is_capped() {
        let config = RetryConfig::requeue().without_jitter();

        assert_eq!(config.calculate_backoff(1), Duration::from_secs(5));
        assert_eq!(config.calculate_backoff(2), Duration::from_secs(10));
        assert_eq!(config.calculate_backoff(20), Duration::from_secs(300));
        assert_eq!(config.calculate_backoff(u32::MAX), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let config = RetryConfig::default().with_max_attempts(3).without_jitter();

        let result: ScanResult<&str> = retry_with_backoff(&config, "fetch_alerts", || {
            let counter = Arc::clone(&counter_clone);
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(ScanError::unavailable("http://zap:8080", "connection reset"))
                } else {
                    Ok("alerts")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "alerts");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fails_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let config = RetryConfig::default().with_max_attempts(3).without_jitter();

        let result: ScanResult<()> = retry_with_backoff(&config, "fetch_summary", || {
            let counter = Arc::clone(&counter_clone);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ScanError::unavailable("http://zap:8080", "refused"))
            }
        })
        .await;

        assert!(matches!(result, Err(ScanError::EngineUnavailable { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let config = RetryConfig::default().with_max_attempts(5).without_jitter();

        let result: ScanResult<()> = retry_with_backoff(&config, "fetch_alerts", || {
            let counter = Arc::clone(&counter_clone);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ScanError::decode("core/alerts", "expected array"))
            }
        })
        .await;

        assert!(matches!(result, Err(ScanError::Decode { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
