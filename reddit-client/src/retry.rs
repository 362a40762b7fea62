use crate::clock::Clock;
use crate::rate_limiter::RequestThrottle;
use birdwatch_core::{CoreError, RetrySettings, SearchApiError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::reddit_search()
    }
}

impl RetryConfig {
    /// Policy for the public search endpoint: 2s × 3ⁿ, five attempts in total.
    pub fn reddit_search() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2000,
            max_delay_ms: 300_000,
            backoff_multiplier: 3.0,
            jitter_factor: 0.0,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            backoff_multiplier: settings.backoff_multiplier,
            jitter_factor: settings.jitter_factor,
        }
    }
}

/// Calculate the wait after the `retry`-th rate limited attempt (1-based).
pub fn calculate_delay(retry: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let multiplier = config.backoff_multiplier.powi(retry as i32);
    let delay_ms = (config.base_delay_ms as f64 * multiplier).min(config.max_delay_ms as f64) as u64;
    let exponential_delay = Duration::from_millis(delay_ms);

    if config.jitter_factor <= 0.0 {
        return exponential_delay;
    }

    // Add jitter to prevent thundering herd
    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);
    (exponential_delay + Duration::from_millis(jitter)).min(max_delay)
}

/// Only rate limit responses are worth another attempt.
pub fn is_rate_limited(error: &CoreError) -> bool {
    matches!(error, CoreError::SearchApi(SearchApiError::RateLimited { .. }))
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryPhase {
    Idle,
    Attempting { attempt: u32 },
    Waiting { delay: Duration },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Exhausted,
    GiveUp,
}

/// Per-call retry bookkeeping. Created fresh by every `execute` and dropped
/// when it returns.
#[derive(Debug)]
pub struct RetryState {
    policy: RetryConfig,
    phase: RetryPhase,
    attempts: u32,
    next_allowed_at: Option<Instant>,
    total_delay: Duration,
}

impl RetryState {
    pub fn new(policy: RetryConfig) -> Self {
        Self {
            policy,
            phase: RetryPhase::Idle,
            attempts: 0,
            next_allowed_at: None,
            total_delay: Duration::ZERO,
        }
    }

    pub fn phase(&self) -> &RetryPhase {
        &self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_allowed_at(&self) -> Option<Instant> {
        self.next_allowed_at
    }

    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.next_allowed_at = None;
        self.phase = RetryPhase::Attempting {
            attempt: self.attempts,
        };
        self.attempts
    }

    pub fn record_success(&mut self) {
        self.phase = RetryPhase::Succeeded {
            attempts: self.attempts,
        };
    }

    /// Moves to `Waiting` when the failure is a rate limit and budget remains,
    /// otherwise to `Failed`.
    pub fn record_failure(&mut self, error: &CoreError, now: Instant) -> RetryDecision {
        if !is_rate_limited(error) {
            self.phase = RetryPhase::Failed {
                attempts: self.attempts,
            };
            return RetryDecision::GiveUp;
        }

        if self.attempts >= self.policy.max_attempts {
            self.phase = RetryPhase::Failed {
                attempts: self.attempts,
            };
            return RetryDecision::Exhausted;
        }

        let delay = calculate_delay(self.attempts, &self.policy);
        self.total_delay += delay;
        self.next_allowed_at = Some(now + delay);
        self.phase = RetryPhase::Waiting { delay };
        RetryDecision::RetryAfter(delay)
    }
}

/// Retry metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_operations: u64,
    pub exhausted_operations: u64,
}

/// Runs one logical request: throttle, attempt, back off on rate limits.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    throttle: Arc<RequestThrottle>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Mutex<RetryMetrics>>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, throttle: Arc<RequestThrottle>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            throttle,
            clock,
            metrics: Arc::new(Mutex::new(RetryMetrics::default())),
        }
    }

    /// Execute an operation with throttling and rate limit retries.
    ///
    /// Non rate limit failures are returned on first occurrence. Running out
    /// of attempts while still rate limited yields `RateLimitExhausted`.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut state = RetryState::new(self.config.clone());

        loop {
            self.throttle.acquire().await;
            let attempt = state.begin_attempt();
            if attempt > 1 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    state.record_success();
                    if attempt > 1 {
                        let mut metrics = self.lock_metrics();
                        metrics.total_retries += (attempt - 1) as u64;
                        metrics.successful_retries += 1;
                        info!(
                            "Operation {} succeeded after {} retries (total delay: {:?})",
                            operation_name,
                            attempt - 1,
                            state.total_delay()
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            debug!(
                "Attempt {} failed for {}: {}",
                attempt, operation_name, error
            );

            match state.record_failure(&error, self.clock.now()) {
                RetryDecision::RetryAfter(delay) => {
                    info!(
                        "Rate limited on {}, waiting {:?} before retry {}",
                        operation_name, delay, attempt
                    );
                    self.clock.sleep(delay).await;
                }
                RetryDecision::Exhausted => {
                    {
                        let mut metrics = self.lock_metrics();
                        metrics.total_retries += (attempt - 1) as u64;
                        metrics.failed_operations += 1;
                        metrics.exhausted_operations += 1;
                    }
                    error!(
                        "Operation {} still rate limited after {} attempts (total delay: {:?})",
                        operation_name,
                        attempt,
                        state.total_delay()
                    );
                    let last_error = match error {
                        CoreError::SearchApi(api_error) => api_error,
                        _ => SearchApiError::RateLimited { retry_after: None },
                    };
                    return Err(CoreError::RateLimitExhausted {
                        attempts: attempt,
                        last_error,
                    });
                }
                RetryDecision::GiveUp => {
                    let mut metrics = self.lock_metrics();
                    metrics.total_retries += (attempt - 1) as u64;
                    metrics.failed_operations += 1;
                    debug!("Not retrying {} due to error type: {}", operation_name, error);
                    return Err(error);
                }
            }
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn throttle(&self) -> &Arc<RequestThrottle> {
        &self.throttle
    }

    /// Get current retry metrics
    pub fn get_metrics(&self) -> RetryMetrics {
        self.lock_metrics().clone()
    }

    /// Reset metrics (useful for testing or periodic cleanup)
    pub fn reset_metrics(&self) {
        *self.lock_metrics() = RetryMetrics::default();
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, RetryMetrics> {
        // Metrics are plain counters; a poisoned lock still holds usable data.
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::ThrottleConfig;
    use crate::testing::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited() -> CoreError {
        CoreError::SearchApi(SearchApiError::RateLimited { retry_after: None })
    }

    fn executor_with(clock: Arc<ManualClock>, config: RetryConfig) -> RetryExecutor {
        let throttle = Arc::new(RequestThrottle::new(
            ThrottleConfig::reddit_public(),
            clock.clone(),
        ));
        RetryExecutor::new(config, throttle, clock)
    }

    #[test]
    fn test_retry_config_reference_policy() {
        let config = RetryConfig::reddit_search();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 2000);
        assert_eq!(config.backoff_multiplier, 3.0);
        assert_eq!(config.jitter_factor, 0.0);
        assert_eq!(RetryConfig::default(), config);
        assert_eq!(
            RetryConfig::from_settings(&RetrySettings::default()),
            config
        );
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig::reddit_search();

        assert_eq!(calculate_delay(1, &config), Duration::from_millis(6_000));
        assert_eq!(calculate_delay(2, &config), Duration::from_millis(18_000));
        assert_eq!(calculate_delay(3, &config), Duration::from_millis(54_000));
        assert_eq!(calculate_delay(4, &config), Duration::from_millis(162_000));

        // Should cap at max_delay_ms
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(300_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
            ..RetryConfig::reddit_search()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000)); // base 2000 + 50% jitter
        }
    }

    #[test]
    fn test_retry_state_transitions() {
        let mut state = RetryState::new(RetryConfig {
            max_attempts: 2,
            ..RetryConfig::reddit_search()
        });
        let now = Instant::now();
        assert_eq!(state.phase(), &RetryPhase::Idle);

        assert_eq!(state.begin_attempt(), 1);
        assert_eq!(state.phase(), &RetryPhase::Attempting { attempt: 1 });

        let decision = state.record_failure(&rate_limited(), now);
        assert_eq!(decision, RetryDecision::RetryAfter(Duration::from_secs(6)));
        assert_eq!(
            state.phase(),
            &RetryPhase::Waiting {
                delay: Duration::from_secs(6)
            }
        );
        assert_eq!(state.next_allowed_at(), Some(now + Duration::from_secs(6)));

        state.begin_attempt();
        assert_eq!(state.record_failure(&rate_limited(), now), RetryDecision::Exhausted);
        assert_eq!(state.phase(), &RetryPhase::Failed { attempts: 2 });
    }

    #[test]
    fn test_retry_state_gives_up_on_other_errors() {
        let mut state = RetryState::new(RetryConfig::reddit_search());
        state.begin_attempt();

        let server_error = CoreError::SearchApi(SearchApiError::ServerError { status_code: 503 });
        assert_eq!(
            state.record_failure(&server_error, Instant::now()),
            RetryDecision::GiveUp
        );
        assert_eq!(state.phase(), &RetryPhase::Failed { attempts: 1 });
    }

    #[tokio::test]
    async fn test_retry_executor_success_on_first_attempt() {
        let clock = Arc::new(ManualClock::new());
        let executor = executor_with(clock.clone(), RetryConfig::reddit_search());

        let result = executor
            .execute("test_operation", || async { Ok::<i32, CoreError>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert!(clock.sleeps().is_empty());

        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, 0);
        assert_eq!(metrics.successful_retries, 0);
    }

    #[tokio::test]
    async fn test_retry_executor_success_after_rate_limits() {
        let clock = Arc::new(ManualClock::new());
        let config = RetryConfig::reddit_search();
        let max_attempts = config.max_attempts;
        let executor = executor_with(clock.clone(), config);

        let failures = max_attempts - 1;
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result = executor
            .execute("test_operation", move || {
                let counter = counter.clone();
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt <= failures {
                        Err(rate_limited())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempt_count.load(Ordering::SeqCst), failures + 1);

        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, failures as u64);
        assert_eq!(metrics.successful_retries, 1);
    }

    #[tokio::test]
    async fn test_retry_executor_exhaustion_is_an_error() {
        let clock = Arc::new(ManualClock::new());
        let executor = executor_with(clock.clone(), RetryConfig::reddit_search());

        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result = executor
            .execute("test_operation", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, CoreError>(rate_limited())
                }
            })
            .await;

        match result {
            Err(CoreError::RateLimitExhausted { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("Expected RateLimitExhausted, got {:?}", other),
        }
        assert_eq!(attempt_count.load(Ordering::SeqCst), 5);

        let metrics = executor.get_metrics();
        assert_eq!(metrics.exhausted_operations, 1);
        assert_eq!(metrics.total_retries, 4);
    }

    #[tokio::test]
    async fn test_backoff_delays_follow_policy() {
        let clock = Arc::new(ManualClock::new());
        let executor = executor_with(clock.clone(), RetryConfig::reddit_search());

        let _ = executor
            .execute("test_operation", || async {
                Err::<i32, CoreError>(rate_limited())
            })
            .await;

        // Backoff waits already exceed the 2s throttle interval, so the
        // throttle never needs to sleep on top of them.
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(6),
                Duration::from_secs(18),
                Duration::from_secs(54),
                Duration::from_secs(162),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_executor_no_retry_on_upstream_error() {
        let clock = Arc::new(ManualClock::new());
        let executor = executor_with(clock.clone(), RetryConfig::reddit_search());

        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result = executor
            .execute("test_operation", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, CoreError>(CoreError::SearchApi(SearchApiError::ServerError {
                        status_code: 500,
                    }))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::SearchApi(SearchApiError::ServerError { status_code: 500 }))
        ));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());

        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, 0);
        assert_eq!(metrics.failed_operations, 1);
    }

    #[tokio::test]
    async fn test_every_attempt_passes_through_throttle() {
        let clock = Arc::new(ManualClock::new());
        let executor = executor_with(
            clock.clone(),
            RetryConfig {
                base_delay_ms: 100,
                backoff_multiplier: 1.0,
                ..RetryConfig::reddit_search()
            },
        );

        let stamps = Arc::new(Mutex::new(Vec::new()));
        let recorder = stamps.clone();
        let clock_for_op = clock.clone();

        let _ = executor
            .execute("test_operation", move || {
                let recorder = recorder.clone();
                let clock = clock_for_op.clone();
                async move {
                    recorder.lock().unwrap().push(clock.now());
                    Err::<i32, CoreError>(rate_limited())
                }
            })
            .await;

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 5);
        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(2000));
        }
    }

    #[tokio::test]
    async fn test_reset_metrics() {
        let clock = Arc::new(ManualClock::new());
        let executor = executor_with(clock, RetryConfig::reddit_search());

        let _ = executor
            .execute("test_operation", || async {
                Err::<i32, CoreError>(CoreError::Internal {
                    message: "boom".to_string(),
                })
            })
            .await;
        assert_eq!(executor.get_metrics().failed_operations, 1);

        executor.reset_metrics();
        assert_eq!(executor.get_metrics(), RetryMetrics::default());
    }
}
