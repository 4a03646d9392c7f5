use priorscan_common::FailureReason;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },

    #[error("{provider} rejected credentials (status {status})")]
    InvalidCredentials { provider: &'static str, status: u16 },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: &'static str },

    #[error("{provider} rejected the request: {detail}")]
    BadRequest { provider: &'static str, detail: String },

    #[error("{provider} upstream error (status {status}): {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SearchError {
    /// Transient conditions worth another attempt. Configuration and
    /// request-shape errors are excluded: they fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::RateLimited { .. }
                | SearchError::Upstream { .. }
                | SearchError::Network(_)
        )
    }

    /// Convert into the channel-failure reason embedded in agent results.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            SearchError::NotConfigured { provider } => FailureReason::NotConfigured {
                provider: provider.to_string(),
            },
            SearchError::InvalidCredentials { provider, .. } => {
                FailureReason::InvalidCredentials {
                    provider: provider.to_string(),
                }
            }
            SearchError::BadRequest { detail, .. } => FailureReason::BadRequest {
                detail: detail.clone(),
            },
            other => FailureReason::Upstream {
                detail: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Network(err.to_string())
    }
}

/// Map an HTTP error status to the channel error taxonomy.
pub(crate) fn classify_status(provider: &'static str, status: u16, message: String) -> SearchError {
    match status {
        401 | 403 => SearchError::InvalidCredentials { provider, status },
        429 => SearchError::RateLimited { provider },
        400 | 422 => SearchError::BadRequest {
            provider,
            detail: message,
        },
        _ => SearchError::Upstream {
            provider,
            status,
            message,
        },
    }
}
