pub mod aggregator;
pub mod api;
pub mod clock;
pub mod fetcher;
pub mod rate_limiter;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;


pub use aggregator::{merge_last_write_wins, ThreadAggregator};
pub use api::{HttpSearchTransport, SearchEndpoint, SearchRequest, SearchTransport};
pub use clock::{Clock, TokioClock};
pub use fetcher::{SearchQuery, ThreadFetcher};
pub use rate_limiter::{RequestThrottle, ThrottleConfig, ThrottlePermit};
pub use retry::{RetryConfig, RetryExecutor, RetryMetrics, RetryPhase, RetryState};
