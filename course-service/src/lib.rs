//! Entry point for callers that need threads about bird courses.
//!
//! Two operations: a general topic search ranked by score, and a course code
//! lookup that merges title, body and general matches.

pub mod error;

pub use error::ServiceError;

use birdwatch_core::{
    BirdwatchConfig, CoreError, CourseCode, SearchSettings, SortOrder, Thread, TimeWindow,
};
use reddit_client::{
    Clock, HttpSearchTransport, RequestThrottle, RetryConfig, RetryExecutor, RetryMetrics,
    SearchEndpoint, SearchQuery, SearchTransport, ThreadAggregator, ThreadFetcher, ThrottleConfig,
    TokioClock,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CourseService {
    fetcher: ThreadFetcher,
    aggregator: ThreadAggregator,
    search: SearchSettings,
}

impl CourseService {
    /// Wires the HTTP transport and the tokio clock from configuration.
    pub fn new(config: &BirdwatchConfig) -> Result<Self, ServiceError> {
        let transport =
            HttpSearchTransport::from_settings(&config.reddit).map_err(ServiceError::Setup)?;
        Self::with_parts(config, Arc::new(transport), Arc::new(TokioClock))
    }

    pub fn with_parts(
        config: &BirdwatchConfig,
        transport: Arc<dyn SearchTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let endpoint = SearchEndpoint::from_settings(&config.reddit).map_err(ServiceError::Setup)?;
        let throttle = Arc::new(RequestThrottle::new(
            ThrottleConfig::from_settings(&config.throttle),
            clock.clone(),
        ));
        let executor = Arc::new(RetryExecutor::new(
            RetryConfig::from_settings(&config.retry),
            throttle,
            clock,
        ));
        let fetcher = ThreadFetcher::new(transport, executor, endpoint);

        Ok(Self {
            aggregator: ThreadAggregator::new(fetcher.clone()),
            fetcher,
            search: config.search.clone(),
        })
    }

    /// General search with the configured query, most engaged threads first.
    pub async fn search_topic(
        &self,
        limit: u32,
        time_window: TimeWindow,
    ) -> Result<Vec<Thread>, ServiceError> {
        info!(
            "Searching for '{}' threads from the past {}",
            self.search.general_query, time_window
        );

        let query = SearchQuery::new(self.search.general_query.clone(), time_window, limit)
            .with_sort(SortOrder::Relevance);
        let mut threads = self.fetcher.fetch(&query).await.map_err(|e| {
            warn!("Topic search failed: {}", e);
            ServiceError::fetch("failed to fetch from source", e)
        })?;

        sort_by_score_desc(&mut threads);
        Ok(threads)
    }

    /// Validates the code before anything goes out, then runs the three
    /// course queries.
    pub async fn search_by_code(&self, code: &str, limit: u32) -> Result<Vec<Thread>, ServiceError> {
        let course_code = CourseCode::parse(code).map_err(|source| {
            warn!("Rejected course code '{}'", code);
            ServiceError::InvalidCourseCode {
                input: code.to_string(),
                source,
            }
        })?;

        self.aggregator
            .fetch_for_topic(&course_code, limit)
            .await
            .map_err(|e: CoreError| {
                warn!("Course search for {} failed: {}", course_code, e);
                ServiceError::fetch(
                    format!("failed to fetch course-specific data for {}", course_code),
                    e,
                )
            })
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.search
    }

    pub fn retry_metrics(&self) -> RetryMetrics {
        self.fetcher.executor().get_metrics()
    }
}

/// Stable, so equal scores keep upstream order.
pub fn sort_by_score_desc(threads: &mut [Thread]) {
    threads.sort_by(|a, b| b.score.cmp(&a.score));
}
