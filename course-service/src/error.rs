use birdwatch_core::CoreError;
use thiserror::Error;

/// Failures surfaced to callers of the course service.
///
/// `Display` carries only the user-facing message; the underlying
/// `CoreError` stays reachable through `source()`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid course code '{input}': expected 2-4 letters followed by 3-4 digits")]
    InvalidCourseCode {
        input: String,
        #[source]
        source: CoreError,
    },

    #[error("{message}")]
    Fetch {
        message: String,
        #[source]
        source: CoreError,
    },

    #[error("course service setup failed: {0}")]
    Setup(#[source] CoreError),
}

impl ServiceError {
    pub(crate) fn fetch(message: impl Into<String>, source: CoreError) -> Self {
        ServiceError::Fetch {
            message: message.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::InvalidCourseCode { .. })
    }

    /// The source kept rate limiting us; retrying later may help.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            ServiceError::Fetch { source, .. } if source.is_rate_limit_exhausted()
        )
    }

    /// The source failed or could not be reached.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ServiceError::Fetch { source, .. } if source.is_upstream()
        )
    }

    pub fn core_error(&self) -> &CoreError {
        match self {
            ServiceError::InvalidCourseCode { source, .. } => source,
            ServiceError::Fetch { source, .. } => source,
            ServiceError::Setup(source) => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use birdwatch_core::SearchApiError;

    #[test]
    fn test_fetch_message_hides_retry_details() {
        let error = ServiceError::fetch(
            "failed to fetch from source",
            CoreError::RateLimitExhausted {
                attempts: 5,
                last_error: SearchApiError::RateLimited { retry_after: None },
            },
        );

        assert_eq!(error.to_string(), "failed to fetch from source");
        assert!(error.is_rate_limited());
        assert!(!error.is_upstream());
        assert!(!error.is_validation());
    }

    #[test]
    fn test_upstream_classification() {
        let error = ServiceError::fetch(
            "failed to fetch course-specific data for EM203",
            CoreError::SearchApi(SearchApiError::ServerError { status_code: 500 }),
        );

        assert!(error.is_upstream());
        assert!(!error.is_rate_limited());
        assert!(matches!(error.core_error(), CoreError::SearchApi(_)));
    }
}
