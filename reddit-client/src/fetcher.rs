use crate::api::{map_listing, SearchEndpoint, SearchRequest, SearchTransport};
use crate::retry::RetryExecutor;
use birdwatch_core::{CoreError, SortOrder, Thread, TimeWindow};
use std::sync::Arc;
use tracing::info;

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub restrict_to_subreddit: bool,
    pub time_window: TimeWindow,
    pub limit: u32,
    pub sort: SortOrder,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, time_window: TimeWindow, limit: u32) -> Self {
        Self {
            query: query.into(),
            restrict_to_subreddit: true,
            time_window,
            limit,
            sort: SortOrder::Relevance,
        }
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    fn to_params(&self) -> Vec<(String, String)> {
        let restrict = if self.restrict_to_subreddit { "on" } else { "off" };
        vec![
            ("q".to_string(), self.query.clone()),
            ("restrict_sr".to_string(), restrict.to_string()),
            ("t".to_string(), self.time_window.to_string()),
            ("limit".to_string(), self.limit.to_string()),
            ("sort".to_string(), self.sort.to_string()),
        ]
    }
}

/// Issues single search queries and normalizes what comes back.
///
/// Results keep upstream order; no sorting, filtering or dedup happens here.
#[derive(Debug, Clone)]
pub struct ThreadFetcher {
    transport: Arc<dyn SearchTransport>,
    executor: Arc<RetryExecutor>,
    endpoint: SearchEndpoint,
}

impl ThreadFetcher {
    pub fn new(
        transport: Arc<dyn SearchTransport>,
        executor: Arc<RetryExecutor>,
        endpoint: SearchEndpoint,
    ) -> Self {
        Self {
            transport,
            executor,
            endpoint,
        }
    }

    pub fn build_request(&self, query: &SearchQuery) -> SearchRequest {
        SearchRequest {
            url: self.endpoint.search_url.clone(),
            params: query.to_params(),
        }
    }

    pub async fn fetch(&self, query: &SearchQuery) -> Result<Vec<Thread>, CoreError> {
        let request = self.build_request(query);
        let operation_name = format!("search '{}'", query.query);

        let payload = self
            .executor
            .execute(&operation_name, || self.transport.search(&request))
            .await?;

        let threads = map_listing(&payload, &self.endpoint.origin)?;
        info!("Retrieved {} threads for {}", threads.len(), operation_name);
        Ok(threads)
    }

    pub fn executor(&self) -> &Arc<RetryExecutor> {
        &self.executor
    }
}
