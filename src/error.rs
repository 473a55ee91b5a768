//! Error types for ryt-nsig

use thiserror::Error;

/// Main error type for deobfuscation operations
#[derive(Debug, Error)]
pub enum RytError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API not available with response code: {status} message: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] std::num::ParseIntError),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Service worker metadata error: {0}")]
    MetadataError(String),

    #[error("Cipher error: {0}")]
    CipherError(String),

    #[error("Evaluator error: {0}")]
    EvaluatorError(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Coarse failure classes, all of them recoverable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Timeout, I/O error or non-success status
    Network,
    /// Regex no-match, malformed JSON, unexpected metadata shape
    Parse,
    /// Rule extractor construction or evaluation failure
    Evaluator,
}

impl RytError {
    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            RytError::RequestFailed(_)
            | RytError::HttpStatus { .. }
            | RytError::TimeoutError(_)
            | RytError::IoError(_) => ErrorCategory::Network,
            RytError::CipherError(_) | RytError::EvaluatorError(_) => ErrorCategory::Evaluator,
            RytError::JsonError(_)
            | RytError::UrlError(_)
            | RytError::RegexError(_)
            | RytError::ParseError(_)
            | RytError::DecodeError(_)
            | RytError::PatternNotFound(_)
            | RytError::MetadataError(_)
            | RytError::Generic(_) => ErrorCategory::Parse,
        }
    }

    /// Check if error came from the network layer
    pub fn is_network_error(&self) -> bool {
        self.category() == ErrorCategory::Network
    }

    /// Check if a later attempt could succeed without any state change
    pub fn is_retryable(&self) -> bool {
        match self {
            RytError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            RytError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            RytError::TimeoutError(_) => true,
            _ => false,
        }
    }
}
