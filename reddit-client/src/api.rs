use async_trait::async_trait;
use birdwatch_core::{
    timestamp_from_epoch_seconds, ConfigError, CoreError, RedditSettings, SearchApiError, Thread,
};
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// One GET against the search endpoint: target URL plus ordered query pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub url: Url,
    pub params: Vec<(String, String)>,
}

impl SearchRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Sends a search request and hands back the decoded JSON body.
///
/// Implementations classify HTTP 429 as `SearchApiError::RateLimited`; the
/// retry executor keys off that variant alone.
#[async_trait]
pub trait SearchTransport: Send + Sync + std::fmt::Debug {
    async fn search(&self, request: &SearchRequest) -> Result<Value, CoreError>;
}

/// Where searches go and which origin permalinks are joined to.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEndpoint {
    pub search_url: Url,
    pub origin: String,
}

impl SearchEndpoint {
    pub fn from_settings(settings: &RedditSettings) -> Result<Self, CoreError> {
        let invalid = || {
            CoreError::Config(ConfigError::InvalidValue {
                field: "reddit.base_url".to_string(),
                value: settings.base_url.clone(),
            })
        };

        let base = Url::parse(&settings.base_url).map_err(|_| invalid())?;
        let search_url = base
            .join(&format!("r/{}/search.json", settings.subreddit))
            .map_err(|_| invalid())?;

        Ok(Self {
            search_url,
            origin: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug)]
pub struct HttpSearchTransport {
    http_client: Client,
    user_agent: String,
}

impl HttpSearchTransport {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            user_agent,
        })
    }

    pub fn from_settings(settings: &RedditSettings) -> Result<Self, CoreError> {
        Self::new(
            settings.user_agent.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }
}

#[async_trait]
impl SearchTransport for HttpSearchTransport {
    async fn search(&self, request: &SearchRequest) -> Result<Value, CoreError> {
        debug!("GET {} {:?}", request.url, request.params);

        let response = self
            .http_client
            .get(request.url.clone())
            .query(&request.params)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                error!("Network error for {}: {}", request.url, e);
                if e.is_timeout() {
                    CoreError::SearchApi(SearchApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok());
        if let Some(api_error) = classify_status(response.status(), retry_after) {
            warn!(
                "Search request failed with status {}: {}",
                response.status(),
                api_error
            );
            return Err(api_error.into());
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse search response: {}", e);
            CoreError::SearchApi(SearchApiError::InvalidResponse {
                details: format!("response body is not JSON: {}", e),
            })
        })
    }
}

/// Maps a non-success status to its error; `None` for 2xx.
pub fn classify_status(status: StatusCode, retry_after: Option<&str>) -> Option<SearchApiError> {
    if status.is_success() {
        return None;
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after.and_then(|value| value.trim().parse::<u64>().ok());
        Some(SearchApiError::RateLimited { retry_after })
    } else if status.is_server_error() {
        Some(SearchApiError::ServerError {
            status_code: status.as_u16(),
        })
    } else {
        Some(SearchApiError::UnexpectedStatus {
            status_code: status.as_u16(),
        })
    }
}

/// Fields read from each `data.children[*].data` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub selftext: Option<String>,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<u64>,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
}

impl RawPost {
    pub fn into_thread(self, origin: &str) -> Result<Thread, CoreError> {
        let created = timestamp_from_epoch_seconds(self.created_utc).ok_or_else(|| {
            CoreError::SearchApi(SearchApiError::InvalidResponse {
                details: format!("post {} has invalid created_utc {}", self.id, self.created_utc),
            })
        })?;

        Ok(Thread {
            url: format!("{}{}", origin, self.permalink),
            id: self.id,
            title: self.title.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            created,
            selftext: self.selftext,
            score: self.score.unwrap_or(0),
            num_comments: self.num_comments.unwrap_or(0),
            upvote_ratio: self.upvote_ratio,
            search_type: None,
        })
    }
}

/// Turns a search response body into threads.
///
/// A body without `data.children` means no matches and yields an empty list.
/// A present item that cannot be read is a malformed response.
pub fn map_listing(payload: &Value, origin: &str) -> Result<Vec<Thread>, CoreError> {
    let children = match payload.pointer("/data/children").and_then(Value::as_array) {
        Some(children) => children,
        None => {
            debug!("Search response has no result container, treating as no matches");
            return Ok(Vec::new());
        }
    };

    children
        .iter()
        .map(|child| {
            let data = child.get("data").ok_or_else(|| {
                CoreError::SearchApi(SearchApiError::InvalidResponse {
                    details: "listing child without data".to_string(),
                })
            })?;
            let raw: RawPost = serde_json::from_value(data.clone()).map_err(|e| {
                CoreError::SearchApi(SearchApiError::InvalidResponse {
                    details: format!("unreadable post: {}", e),
                })
            })?;
            raw.into_thread(origin)
        })
        .collect()
}
