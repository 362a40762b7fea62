use crate::fetcher::{SearchQuery, ThreadFetcher};
use birdwatch_core::{CoreError, CourseCode, SearchType, Thread, TimeWindow};
use std::collections::HashMap;
use tracing::{debug, info};

/// Query variants issued for a course lookup, in merge order.
pub const COURSE_QUERY_VARIANTS: [SearchType; 3] = [
    SearchType::TitleMatch,
    SearchType::BodyMatch,
    SearchType::GeneralMatch,
];

pub fn course_query(code: &CourseCode, search_type: SearchType) -> String {
    match search_type {
        SearchType::TitleMatch => format!("title:{}", code),
        SearchType::BodyMatch => format!("selftext:{}", code),
        SearchType::GeneralMatch => code.to_string(),
    }
}

/// Deduplicates by id. When an id repeats, the later record replaces the
/// earlier one in the earlier one's position.
pub fn merge_last_write_wins(threads: Vec<Thread>) -> Vec<Thread> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(threads.len());
    let mut merged: Vec<Thread> = Vec::with_capacity(threads.len());

    for thread in threads {
        match positions.get(&thread.id) {
            Some(&index) => merged[index] = thread,
            None => {
                positions.insert(thread.id.clone(), merged.len());
                merged.push(thread);
            }
        }
    }

    merged
}

/// Runs the title, body and general searches for a course code one after
/// another and merges them.
#[derive(Debug, Clone)]
pub struct ThreadAggregator {
    fetcher: ThreadFetcher,
}

impl ThreadAggregator {
    pub fn new(fetcher: ThreadFetcher) -> Self {
        Self { fetcher }
    }

    pub async fn fetch_for_topic(
        &self,
        code: &CourseCode,
        limit: u32,
    ) -> Result<Vec<Thread>, CoreError> {
        let mut all_threads = Vec::new();

        for search_type in COURSE_QUERY_VARIANTS {
            let query = SearchQuery::new(course_query(code, search_type), TimeWindow::All, limit);
            let threads = self.fetcher.fetch(&query).await?;
            debug!("{} returned {} threads for {}", search_type, threads.len(), code);

            all_threads.extend(
                threads
                    .into_iter()
                    .map(|thread| thread.with_search_type(search_type)),
            );
        }

        let total = all_threads.len();
        let unique = merge_last_write_wins(all_threads);
        info!(
            "Fetched {} unique threads about {} (from {} total matches)",
            unique.len(),
            code,
            total
        );

        Ok(unique)
    }

    pub fn fetcher(&self) -> &ThreadFetcher {
        &self.fetcher
    }
}
