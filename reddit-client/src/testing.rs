//! Fakes for exercising the client without network access or real time.
//!
//! Available to this crate's tests and, through the `test-utils` feature, to
//! downstream crates.

use crate::api::{SearchEndpoint, SearchRequest, SearchTransport};
use crate::clock::Clock;
use crate::fetcher::ThreadFetcher;
use crate::rate_limiter::{RequestThrottle, ThrottleConfig};
use crate::retry::{RetryConfig, RetryExecutor};
use async_trait::async_trait;
use birdwatch_core::{CoreError, RedditSettings, SearchApiError};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Virtual clock: `sleep` returns immediately after advancing time.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Moves time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Payload(Value),
    Error(SearchApiError),
}

/// Replays queued responses in order and records every request it receives,
/// together with the virtual time it arrived at.
#[derive(Debug)]
pub struct ScriptedTransport {
    clock: Arc<ManualClock>,
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<(Instant, SearchRequest)>>,
}

impl ScriptedTransport {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_payload(&self, payload: Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Payload(payload));
    }

    pub fn push_error(&self, error: SearchApiError) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Error(error));
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchTransport for ScriptedTransport {
    async fn search(&self, request: &SearchRequest) -> Result<Value, CoreError> {
        self.requests
            .lock()
            .unwrap()
            .push((self.clock.now(), request.clone()));

        match self.responses.lock().unwrap().pop_front() {
            Some(ScriptedResponse::Payload(payload)) => Ok(payload),
            Some(ScriptedResponse::Error(error)) => Err(error.into()),
            None => Err(CoreError::Internal {
                message: "no scripted response left".to_string(),
            }),
        }
    }
}

/// A search response body wrapping the given raw posts.
pub fn listing(posts: Vec<Value>) -> Value {
    let children: Vec<Value> = posts
        .into_iter()
        .map(|data| json!({ "kind": "t3", "data": data }))
        .collect();
    json!({ "kind": "Listing", "data": { "children": children, "after": null } })
}

pub fn raw_post(id: &str, score: i64) -> Value {
    json!({
        "id": id,
        "title": format!("Thread {}", id),
        "author": "goldenhawk",
        "selftext": "",
        "permalink": format!("/r/wlu/comments/{}/thread/", id),
        "created_utc": 1700000000.0,
        "score": score,
        "num_comments": 3,
        "upvote_ratio": 0.9
    })
}

/// Fetcher over a scripted transport with the reference throttle and retry policy.
pub fn test_fetcher(transport: Arc<ScriptedTransport>, clock: Arc<ManualClock>) -> ThreadFetcher {
    let throttle = Arc::new(RequestThrottle::new(
        ThrottleConfig::reddit_public(),
        clock.clone(),
    ));
    let executor = Arc::new(RetryExecutor::new(
        RetryConfig::reddit_search(),
        throttle,
        clock,
    ));
    let endpoint = SearchEndpoint::from_settings(&RedditSettings::default())
        .expect("default settings produce a valid endpoint");
    ThreadFetcher::new(transport, executor, endpoint)
}
