//! Error types for the scout engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scout engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    // Data access errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Rate limited by provider")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Provider quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed provider payload: {0}")]
    Payload(String),

    #[error("Unknown token mint: {0}")]
    UnknownMint(String),

    // Execution errors
    #[error("Quote failed: {0}")]
    Quote(String),

    #[error("Swap failed: {0}")]
    Swap(String),

    #[error("Confirmation failed: {0}")]
    Confirm(String),

    // Position management errors
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("State persistence failed: {0}")]
    StatePersistence(String),

    // Manual control errors
    #[error("Control rejected: {0}")]
    ControlRejected(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::RateLimited { .. } | Error::Provider(_) | Error::Confirm(_)
        )
    }

    /// Check if this error is a provider-declared hard-quota condition
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Error::QuotaExhausted(_))
    }

    /// Server-declared retry delay, if the provider sent one
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Error::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Http("timeout".to_string()).is_retryable());
        assert!(Error::RateLimited {
            retry_after_ms: None
        }
        .is_retryable());
        assert!(!Error::Config("bad".to_string()).is_retryable());
        assert!(!Error::QuotaExhausted("CU limit".to_string()).is_retryable());
    }

    #[test]
    fn test_quota_classification() {
        assert!(Error::QuotaExhausted("CU limit".to_string()).is_quota_exhausted());
        assert!(!Error::RateLimited {
            retry_after_ms: Some(100)
        }
        .is_quota_exhausted());
    }

    #[test]
    fn test_retry_after_passthrough() {
        let err = Error::RateLimited {
            retry_after_ms: Some(1500),
        };
        assert_eq!(err.retry_after_ms(), Some(1500));
        assert_eq!(Error::Provider("x".to_string()).retry_after_ms(), None);
    }
}
