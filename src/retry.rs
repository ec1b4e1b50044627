use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// initial, 2x initial, 3x initial, ...
    Linear,
    /// initial, initial * m, initial * m^2, ...
    Exponential,
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Growth strategy for the delay
    pub backoff: Backoff,
    /// Multiplier for exponential backoff (ignored for linear)
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Create a new retry configuration (exponential, doubling)
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential,
            backoff_multiplier: 2.0,
        }
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Use linearly increasing delays
    pub fn linear(mut self) -> Self {
        self.backoff = Backoff::Linear;
        self
    }

    /// Preset: translation gateway calls (3 attempts, linear)
    /// Delays: 1s, 2s = 3s total wait time
    pub fn translation() -> Self {
        Self::new(3, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10))
            .linear()
    }

    /// Preset: database and other internal calls (3 attempts)
    /// Delays: 500ms, 1s = 1.5s total wait time
    pub fn database() -> Self {
        Self::new(3, Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(2))
            .with_backoff_multiplier(2.0)
    }

    /// Preset: batch trigger requests from the driver (4 attempts)
    /// Delays: 2s, 4s, 8s = 14s total wait time
    pub fn batch_trigger() -> Self {
        Self::new(4, Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(8))
            .with_backoff_multiplier(2.0)
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.backoff {
            Backoff::Linear => self.initial_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let delay_ms = self.initial_delay.as_millis() as f64
                    * self.backoff_multiplier.powi((attempt - 1) as i32);
                Duration::from_millis(delay_ms as u64)
            }
        };

        delay.min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::translation()
    }
}

/// Execute an async operation with retries
///
/// # Panics
/// Panics if `config.max_attempts` is 0
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(config, operation_name, operation, |_| true).await
}

/// Execute an async operation with retries, using a predicate to determine if retry is appropriate
///
/// Some errors (like 4xx client errors) should not be retried, while others (5xx, network) should.
///
/// # Panics
/// Panics if `config.max_attempts` is 0
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    assert!(
        config.max_attempts >= 1,
        "RetryConfig.max_attempts must be >= 1, got {}",
        config.max_attempts
    );

    let mut attempt = 0;
    loop {
        // Wait before retry (except for first attempt)
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                "{}: Retry attempt {}/{} after {:?}",
                operation_name,
                attempt + 1,
                config.max_attempts,
                delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}/{}",
                        operation_name,
                        attempt + 1,
                        config.max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(
                        "{}: Error is not retryable, failing immediately: {}",
                        operation_name, e
                    );
                    return Err(e);
                }

                let remaining = config.max_attempts - attempt - 1;
                if remaining == 0 {
                    warn!(
                        "{}: All {} attempts failed. Last error: {}",
                        operation_name, config.max_attempts, e
                    );
                    return Err(e);
                }

                warn!(
                    "{}: Attempt {}/{} failed ({}), {} retries remaining",
                    operation_name,
                    attempt + 1,
                    config.max_attempts,
                    e,
                    remaining
                );
                attempt += 1;
            }
        }
    }
}

/// Retry and pacing policy for one external service.
///
/// Every call site that talks to a rate-limited service goes through the same
/// policy: calls are spaced at least `pacing` apart, and each call is retried
/// according to `retry`. The pacing clock is shared by all callers holding a
/// reference to the policy.
#[derive(Debug)]
pub struct CallPolicy {
    retry: RetryConfig,
    pacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallPolicy {
    pub fn new(retry: RetryConfig, pacing: Duration) -> Self {
        Self {
            retry,
            pacing,
            last_call: Mutex::new(None),
        }
    }

    /// Policy used for the translation service
    pub fn translation(pacing: Duration) -> Self {
        Self::new(RetryConfig::translation(), pacing)
    }

    /// No retries and no pacing (tests and dry runs)
    pub fn immediate() -> Self {
        Self::new(RetryConfig::new(1, Duration::ZERO), Duration::ZERO)
    }

    /// Sleep until at least `pacing` has passed since the previous call.
    async fn pace(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let ready_at = previous + self.pacing;
            let now = Instant::now();
            if ready_at > now {
                sleep(ready_at - now).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    /// Run `operation` under this policy.
    ///
    /// Each attempt (including retries) is paced. Errors for which
    /// `should_retry` returns false are returned without further attempts.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        operation_name: &str,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        with_retry_if(
            &self.retry,
            operation_name,
            || {
                let attempt = operation();
                async move {
                    self.pace().await;
                    attempt.await
                }
            },
            should_retry,
        )
        .await
    }
}
