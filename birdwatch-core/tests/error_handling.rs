use birdwatch_core::{
    BirdwatchConfig, ConfigError, CoreError, ErrorExt, ErrorReporter, SearchApiError,
};
use std::error::Error;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_error_codes() {
    let api_error = CoreError::SearchApi(SearchApiError::RequestTimeout);
    assert_eq!(api_error.error_code(), "SEARCH_API");

    let config_error = CoreError::Config(ConfigError::ValidationFailed {
        reason: "empty".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let exhausted = CoreError::RateLimitExhausted {
        attempts: 5,
        last_error: SearchApiError::RateLimited { retry_after: None },
    };
    assert_eq!(exhausted.error_code(), "RATE_LIMIT_EXHAUSTED");

    let invalid = CoreError::InvalidInput {
        message: "bad code".to_string(),
    };
    assert_eq!(invalid.error_code(), "INVALID_INPUT");
}

#[test]
fn test_retryable_errors() {
    let rate_limited = CoreError::SearchApi(SearchApiError::RateLimited {
        retry_after: Some(10),
    });
    assert!(rate_limited.is_retryable());

    let invalid_response = CoreError::SearchApi(SearchApiError::InvalidResponse {
        details: "not json".to_string(),
    });
    assert!(!invalid_response.is_retryable());

    let invalid_input = CoreError::InvalidInput {
        message: "12345".to_string(),
    };
    assert!(!invalid_input.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limited = CoreError::SearchApi(SearchApiError::RateLimited {
        retry_after: Some(60),
    });
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

    let exhausted = CoreError::RateLimitExhausted {
        attempts: 5,
        last_error: SearchApiError::RateLimited {
            retry_after: Some(120),
        },
    };
    assert_eq!(exhausted.retry_after(), Some(Duration::from_secs(120)));

    let config_error = CoreError::Config(ConfigError::FileNotFound {
        path: "birdwatch.toml".to_string(),
    });
    assert_eq!(config_error.retry_after(), None);
}

#[test]
fn test_error_classification() {
    let exhausted = CoreError::RateLimitExhausted {
        attempts: 5,
        last_error: SearchApiError::RateLimited { retry_after: None },
    };
    assert!(exhausted.is_rate_limit_exhausted());
    assert!(!exhausted.is_upstream());
    assert!(exhausted.source().is_some());

    let server = CoreError::SearchApi(SearchApiError::ServerError { status_code: 503 });
    assert!(server.is_upstream());
    assert!(!server.is_rate_limit_exhausted());
}

#[test]
fn test_user_friendly_messages() {
    let exhausted = CoreError::RateLimitExhausted {
        attempts: 5,
        last_error: SearchApiError::RateLimited { retry_after: None },
    };
    let message = exhausted.user_friendly_message();
    assert!(message.contains("try again later"));
    assert!(!message.contains('5'));

    let config_error = CoreError::Config(ConfigError::InvalidValue {
        field: "retry.max_attempts".to_string(),
        value: "0".to_string(),
    });
    assert!(config_error
        .user_friendly_message()
        .contains("retry.max_attempts"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::SearchApi(SearchApiError::ServerError { status_code: 502 });

    // This test just ensures the methods don't panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[throttle]\nmin_interval_ms = 500\n\n[retry]\nmax_attempts = 3").unwrap();

    let config = BirdwatchConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.throttle.min_interval_ms, 500);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.base_delay_ms, 2000);
}

#[test]
fn test_load_missing_config_file() {
    let result = BirdwatchConfig::load(Some(std::path::Path::new(
        "/nonexistent/birdwatch/config.toml",
    )));
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}
