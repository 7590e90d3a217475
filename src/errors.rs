use std::io;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("no mirror available (tried {})", tried.join(", "))]
    NoMirrorAvailable { tried: Vec<String> },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: StatusCode },
    #[error("no data from {url} for {idle:?}")]
    Stalled { url: String, idle: Duration },
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("File system error: {0}")]
    FileSystem(#[from] io::Error),
    #[error("Archive error: {0}")]
    Archive(String),
    #[error("Icon error: {0}")]
    Icon(#[from] image::ImageError),
    #[error("Malformed URI field: {0:?}")]
    MalformedField(String),
    #[error("failed to spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("launched process exited during startup ({0})")]
    EarlyExit(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("download cancelled")]
    Cancelled,
    #[error("another bootstrapper instance is already running")]
    AlreadyRunning,
}

impl BootstrapError {
    /// Transient network failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BootstrapError::Network(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            }
            BootstrapError::Http { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            BootstrapError::Stalled { .. } => true,
            _ => false,
        }
    }

    /// Failures after which rerunning the whole pipeline may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BootstrapError::NoMirrorAvailable { .. }) || self.is_retryable()
    }
}

impl From<zip::result::ZipError> for BootstrapError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => BootstrapError::FileSystem(io),
            other => BootstrapError::Archive(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = BootstrapError::Http {
            url: "https://example.invalid".to_string(),
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(err.is_retryable());
        assert!(err.is_recoverable());
    }

    #[test]
    fn client_errors_are_final() {
        let err = BootstrapError::Http {
            url: "https://example.invalid".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(!err.is_retryable());
        assert!(!BootstrapError::MalformedField("x".to_string()).is_recoverable());
    }

    #[test]
    fn stalled_transfers_are_retryable() {
        let err = BootstrapError::Stalled {
            url: "https://example.invalid/a.zip".to_string(),
            idle: Duration::from_secs(10),
        };
        assert!(err.is_retryable());
        assert!(err.is_recoverable());
    }

    #[test]
    fn mirror_exhaustion_is_recoverable_but_not_retried_inline() {
        let err = BootstrapError::NoMirrorAvailable {
            tried: vec!["https://a".to_string(), "https://b".to_string()],
        };
        assert!(!err.is_retryable());
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "no mirror available (tried https://a, https://b)");
    }
}
