use crate::clock::Clock;
use birdwatch_core::ThrottleSettings;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleConfig {
    pub min_interval: Duration,
}

impl ThrottleConfig {
    pub fn reddit_public() -> Self {
        Self {
            min_interval: Duration::from_millis(2000), // unauthenticated search endpoint
        }
    }

    pub fn from_settings(settings: &ThrottleSettings) -> Self {
        Self {
            min_interval: Duration::from_millis(settings.min_interval_ms),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::reddit_public()
    }
}

/// Enforces a floor on the spacing between outbound calls.
///
/// One instance is shared (behind an `Arc`) by every component that talks to
/// the search endpoint. There is no queue and no fairness: each caller waits
/// out whatever remains of the gap measured from the latest stamp.
#[derive(Debug)]
pub struct RequestThrottle {
    config: ThrottleConfig,
    clock: Arc<dyn Clock>,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ThrottlePermit {
    pub queue_wait_time: Duration,
    pub stamped_at: Instant,
}

impl RequestThrottle {
    pub fn new(config: ThrottleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            last_request: Mutex::new(None),
        }
    }

    /// Waits until the minimum interval since the previous call has passed,
    /// then stamps the shared timestamp.
    ///
    /// The lock is held across the wait so the read, the wait and the stamp
    /// form one critical section when several tasks contend.
    pub async fn acquire(&self) -> ThrottlePermit {
        let mut last_request = self.last_request.lock().await;
        let mut queue_wait_time = Duration::ZERO;

        if let Some(previous) = *last_request {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.config.min_interval {
                queue_wait_time = self.config.min_interval - elapsed;
                tracing::debug!("Throttling outbound request for {:?}", queue_wait_time);
                self.clock.sleep(queue_wait_time).await;
            }
        }

        let stamped_at = self.clock.now();
        *last_request = Some(stamped_at);

        ThrottlePermit {
            queue_wait_time,
            stamped_at,
        }
    }

    /// Remaining wait a caller would see right now, without stamping.
    pub async fn time_until_ready(&self) -> Duration {
        let last_request = self.last_request.lock().await;
        match *last_request {
            Some(previous) => {
                let elapsed = self.clock.now().saturating_duration_since(previous);
                self.config.min_interval.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    pub async fn last_request_time(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }

    pub fn min_interval(&self) -> Duration {
        self.config.min_interval
    }
}
