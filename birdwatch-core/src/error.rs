use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Search API error: {0}")]
    SearchApi(#[from] SearchApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Rate limit retries exhausted after {attempts} attempts")]
    RateLimitExhausted {
        attempts: u32,
        #[source]
        last_error: SearchApiError,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// True for failures of the upstream source that are not rate limiting.
    pub fn is_upstream(&self) -> bool {
        match self {
            CoreError::SearchApi(e) => !e.is_rate_limited(),
            CoreError::Network(_) | CoreError::Serialization(_) => true,
            _ => false,
        }
    }

    pub fn is_rate_limit_exhausted(&self) -> bool {
        matches!(self, CoreError::RateLimitExhausted { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchApiError {
    #[error("Rate limited by search endpoint")]
    RateLimited { retry_after: Option<u64> },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Unexpected status: {status_code}")]
    UnexpectedStatus { status_code: u16 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },
}

impl SearchApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SearchApiError::RateLimited { .. })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
