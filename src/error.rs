use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::resolver::ContentKind;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Invalid reference '{input}': {reason}")]
    InvalidReference { input: String, reason: InvalidReason },

    #[error("Transport failure ({kind}) for {url}: {detail}")]
    TransportFailure {
        url: String,
        kind: TransportFailureKind,
        detail: String,
    },

    #[error("Extraction failed for {kind} via {stage} extractor: {reason}")]
    ExtractionFailure {
        kind: ContentKind,
        stage: ExtractorStage,
        reason: ExtractionReason,
    },

    #[error("Authentication required for {field}: {detail}")]
    AuthenticationRequired { field: &'static str, detail: String },

    #[error("Media failure ({kind}): {detail}")]
    MediaFailure { kind: MediaFailureKind, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Machine-checkable error category, serialized into bulk results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidReference,
    TransportFailure,
    ExtractionFailure,
    AuthenticationRequired,
    MediaFailure,
    Config,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Empty,
    Unparseable(String),
    UnsupportedScheme(String),
    WrongHost(String),
    UnsupportedKind(String),
    MissingId,
    MalformedId(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Empty => write!(f, "empty input"),
            InvalidReason::Unparseable(e) => write!(f, "not a URL or URI ({})", e),
            InvalidReason::UnsupportedScheme(s) => write!(f, "unsupported scheme '{}'", s),
            InvalidReason::WrongHost(h) => write!(f, "host '{}' is not a Spotify host", h),
            InvalidReason::UnsupportedKind(k) => write!(f, "unsupported content kind '{}'", k),
            InvalidReason::MissingId => write!(f, "no content id"),
            InvalidReason::MalformedId(id) => write!(f, "malformed content id '{}'", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailureKind {
    Timeout,
    Refused,
    HttpStatus(u16),
    Blocked,
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailureKind::Timeout => write!(f, "timeout"),
            TransportFailureKind::Refused => write!(f, "refused"),
            TransportFailureKind::HttpStatus(code) => write!(f, "http status {}", code),
            TransportFailureKind::Blocked => write!(f, "blocked"),
        }
    }
}

/// Which extractor was consulted when a normalization failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorStage {
    Primary,
    Fallback,
    Merged,
}

impl fmt::Display for ExtractorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractorStage::Primary => write!(f, "primary"),
            ExtractorStage::Fallback => write!(f, "fallback"),
            ExtractorStage::Merged => write!(f, "primary+fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionReason {
    MissingRequiredField(&'static str),
    UnrecognizedShape(String),
}

impl fmt::Display for ExtractionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionReason::MissingRequiredField(field) => {
                write!(f, "missing required field '{}'", field)
            }
            ExtractionReason::UnrecognizedShape(detail) => {
                write!(f, "unrecognized page shape ({})", detail)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFailureKind {
    NoSource,
    TransportFailure,
    WriteFailure,
}

impl fmt::Display for MediaFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaFailureKind::NoSource => write!(f, "no source"),
            MediaFailureKind::TransportFailure => write!(f, "transport failure"),
            MediaFailureKind::WriteFailure => write!(f, "write failure"),
        }
    }
}

impl ScrapeError {
    pub fn invalid(input: &str, reason: InvalidReason) -> Self {
        Self::InvalidReference {
            input: input.to_string(),
            reason,
        }
    }

    pub fn transport(url: &str, kind: TransportFailureKind, detail: impl Into<String>) -> Self {
        Self::TransportFailure {
            url: url.to_string(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn missing_field(kind: ContentKind, stage: ExtractorStage, field: &'static str) -> Self {
        Self::ExtractionFailure {
            kind,
            stage,
            reason: ExtractionReason::MissingRequiredField(field),
        }
    }

    pub fn unrecognized(kind: ContentKind, stage: ExtractorStage, detail: impl Into<String>) -> Self {
        Self::ExtractionFailure {
            kind,
            stage,
            reason: ExtractionReason::UnrecognizedShape(detail.into()),
        }
    }

    pub fn media(kind: MediaFailureKind, detail: impl Into<String>) -> Self {
        Self::MediaFailure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::InvalidReference { .. } => ErrorKind::InvalidReference,
            ScrapeError::TransportFailure { .. } => ErrorKind::TransportFailure,
            ScrapeError::ExtractionFailure { .. } => ErrorKind::ExtractionFailure,
            ScrapeError::AuthenticationRequired { .. } => ErrorKind::AuthenticationRequired,
            ScrapeError::MediaFailure { .. } => ErrorKind::MediaFailure,
            ScrapeError::Config(_) => ErrorKind::Config,
            ScrapeError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only timeouts and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::TransportFailure { kind, .. } => match kind {
                TransportFailureKind::Timeout => true,
                TransportFailureKind::HttpStatus(code) => *code >= 500,
                _ => false,
            },
            _ => false,
        }
    }

    /// Errors that will hit every remaining item of a batch the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScrapeError::AuthenticationRequired { .. }
                | ScrapeError::TransportFailure {
                    kind: TransportFailureKind::Blocked,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let timeout = ScrapeError::transport("u", TransportFailureKind::Timeout, "slow");
        let server = ScrapeError::transport("u", TransportFailureKind::HttpStatus(503), "down");
        let missing = ScrapeError::transport("u", TransportFailureKind::HttpStatus(404), "gone");
        let extraction =
            ScrapeError::missing_field(ContentKind::Track, ExtractorStage::Merged, "name");

        assert!(timeout.is_retryable());
        assert!(server.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!extraction.is_retryable());
        assert!(!ScrapeError::invalid("x", InvalidReason::Empty).is_retryable());
    }

    #[test]
    fn test_fatal_errors() {
        let blocked = ScrapeError::transport("u", TransportFailureKind::Blocked, "429");
        let auth = ScrapeError::AuthenticationRequired {
            field: "lyrics",
            detail: "no cookie".into(),
        };
        assert!(blocked.is_fatal());
        assert!(auth.is_fatal());
        assert!(!ScrapeError::Cancelled.is_fatal());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ExtractionFailure).unwrap();
        assert_eq!(json, "\"extraction_failure\"");
    }
}
