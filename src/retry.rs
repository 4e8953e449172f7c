//! Retry logic module.
//!
//! This module provides retry functionality with exponential backoff
//! for riding out short periods where another process holds the
//! session store's write lock.

use crate::config;
use crate::error::{PomoError, Result};
use log::debug;
use std::thread;
use std::time::Duration;

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Factor to multiply delay by after each attempt (for exponential backoff)
    pub backoff_factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 50,
            max_delay_ms: 2000,
            backoff_factor: 1.5,
        }
    }
}

impl From<&config::RetrySettings> for RetryConfig {
    fn from(settings: &config::RetrySettings) -> Self {
        RetryConfig {
            max_attempts: settings.max_attempts.max(1),
            initial_delay_ms: settings.initial_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            backoff_factor: settings.backoff_factor,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no sleeping. Used by tests that want busy errors surfaced immediately.
    pub fn no_retry() -> Self {
        RetryConfig {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_factor: 1.0,
        }
    }
}

/// Check if an error is retryable
pub fn is_retryable_error(error: &PomoError) -> bool {
    match error {
        // Database busy errors are retryable
        PomoError::Database(e) => {
            if error.is_busy() {
                return true;
            }
            let error_string = e.to_string().to_lowercase();
            error_string.contains("busy") || error_string.contains("locked")
        }
        PomoError::Busy(_) => true,
        // I/O errors are often transient
        PomoError::Io(_) => true,
        // Everything else reflects the data or the request, not contention
        _ => false,
    }
}

/// Retry any failure with exponential backoff, returning the last error.
pub fn retry_with_backoff<F, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut current_delay = config.initial_delay_ms;
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_error = Some(e);

                if attempt < config.max_attempts {
                    debug!(
                        "Attempt {}/{} failed, retrying in {}ms...",
                        attempt, config.max_attempts, current_delay
                    );

                    thread::sleep(Duration::from_millis(current_delay));

                    current_delay = ((current_delay as f32 * config.backoff_factor) as u64)
                        .min(config.max_delay_ms);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PomoError::other("Retry failed with no error information")))
}

/// Retry only if the error is retryable.
///
/// Once attempts are exhausted a busy failure is reported as
/// [`PomoError::Busy`] so callers can tell it apart from corruption.
pub fn retry_if_retryable<F, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut current_delay = config.initial_delay_ms;
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_retryable_error(&e) {
                    return Err(e);
                }

                last_error = Some(e);

                // Don't sleep after the last attempt
                if attempt < config.max_attempts {
                    debug!(
                        "Retryable error on attempt {}/{}, retrying in {}ms...",
                        attempt, config.max_attempts, current_delay
                    );

                    thread::sleep(Duration::from_millis(current_delay));

                    current_delay = ((current_delay as f32 * config.backoff_factor) as u64)
                        .min(config.max_delay_ms);
                }
            }
        }
    }

    match last_error {
        Some(e) if e.is_busy() => Err(PomoError::busy(format!(
            "gave up after {} attempts: {}",
            config.max_attempts, e
        ))),
        Some(e) => Err(e),
        None => Err(PomoError::other("Retry failed with no error information")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn busy_error() -> PomoError {
        PomoError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        ))
    }

    #[test]
    fn test_retry_success_on_third_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 10,
            max_delay_ms: 100,
            backoff_factor: 2.0,
        };

        let result = retry_if_retryable(&config, || {
            let count = attempts_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                Err(busy_error())
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausted_busy_surfaces_as_busy() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_factor: 2.0,
        };

        let result = retry_if_retryable(&config, || -> Result<i32> { Err(busy_error()) });

        match result {
            Err(PomoError::Busy(msg)) => assert!(msg.contains("3 attempts")),
            other => panic!("expected busy error, got {:?}", other),
        }
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&busy_error()));
        assert!(is_retryable_error(&PomoError::busy("pool")));
        assert!(!is_retryable_error(&PomoError::validation("bad tag")));
        assert!(!is_retryable_error(&PomoError::invalid_state("no pause")));
        assert!(!is_retryable_error(&PomoError::not_found("none")));
    }

    #[test]
    fn test_retry_if_retryable_non_retryable_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let config = RetryConfig::default();

        let result = retry_if_retryable(&config, || -> Result<i32> {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Err(PomoError::invalid_state("paused_at missing"))
        });

        assert!(result.is_err());
        // Should only try once since the error is not retryable
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_with_backoff_retries_everything() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_factor: 1.0,
        };

        let result = retry_with_backoff(&config, || -> Result<i32> {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Err(PomoError::unavailable("cannot open"))
        });

        assert!(matches!(result, Err(PomoError::StoreUnavailable(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exponential_backoff_timing() {
        let start = std::time::Instant::now();

        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 50,
            max_delay_ms: 200,
            backoff_factor: 2.0,
        };

        let _result = retry_if_retryable(&config, || -> Result<i32> { Err(busy_error()) });

        let elapsed = start.elapsed().as_millis();
        // Delays of 50ms and 100ms
        assert!(elapsed >= 150);
    }
}
