use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeizureError {
    #[error("Unreadable recording: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid window configuration: {0}")]
    InvalidWindowConfig(String),

    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    #[error("Recording too short: {0}")]
    EmptyBatch(String),

    #[error("Model not loaded: {0}")]
    ModelUnavailable(String),

    #[error("Unsupported sampling rate: {0}")]
    UnsupportedSampleRate(String),

    #[error("Processing cancelled before {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SeizureError>;

/// Outward failure categories, one per error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FormatError,
    ReadError,
    InvalidWindowConfig,
    FilterDesignError,
    EmptyBatch,
    ModelUnavailable,
    UnsupportedSampleRate,
    Cancelled,
    InternalError,
}

impl ErrorKind {
    /// Whether the caller can fix the failure by sending different data.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::FormatError
                | ErrorKind::FilterDesignError
                | ErrorKind::EmptyBatch
                | ErrorKind::UnsupportedSampleRate
        )
    }

    /// Status code an HTTP layer would answer with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::FormatError | ErrorKind::EmptyBatch => 400,
            ErrorKind::FilterDesignError | ErrorKind::UnsupportedSampleRate => 422,
            ErrorKind::ModelUnavailable | ErrorKind::ReadError => 503,
            ErrorKind::Cancelled => 499,
            ErrorKind::InvalidWindowConfig | ErrorKind::InternalError => 500,
        }
    }
}

impl SeizureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SeizureError::Format(_) => ErrorKind::FormatError,
            SeizureError::Read(_) => ErrorKind::ReadError,
            SeizureError::InvalidWindowConfig(_) => ErrorKind::InvalidWindowConfig,
            SeizureError::FilterDesign(_) => ErrorKind::FilterDesignError,
            SeizureError::EmptyBatch(_) => ErrorKind::EmptyBatch,
            SeizureError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            SeizureError::UnsupportedSampleRate(_) => ErrorKind::UnsupportedSampleRate,
            SeizureError::Cancelled(_) => ErrorKind::Cancelled,
            SeizureError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Only I/O failures are worth retrying, and only by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SeizureError::Read(_))
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Structured failure payload handed to the API layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_read_kind() {
        let err: SeizureError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert_eq!(err.kind(), ErrorKind::ReadError);
        assert!(err.is_retryable());
        assert!(!err.kind().is_client_error());
    }

    #[test]
    fn test_client_and_server_kinds_are_distinguishable() {
        assert!(ErrorKind::FormatError.is_client_error());
        assert!(ErrorKind::EmptyBatch.is_client_error());
        assert!(ErrorKind::FilterDesignError.is_client_error());
        assert!(!ErrorKind::ModelUnavailable.is_client_error());
        assert!(!ErrorKind::InternalError.is_client_error());
        assert_eq!(ErrorKind::EmptyBatch.http_status(), 400);
        assert_eq!(ErrorKind::ModelUnavailable.http_status(), 503);
    }

    #[test]
    fn test_error_response_serializes_snake_case_kind() {
        let err = SeizureError::EmptyBatch("768 samples, need 1024".to_string());
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["kind"], "empty_batch");
        assert!(json["message"].as_str().unwrap().contains("768 samples"));
    }
}
