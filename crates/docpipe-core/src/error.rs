// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docpipe.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all docpipe operations.
#[derive(Debug, Error)]
pub enum DocpipeError {
    // -- Caller errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    // -- Image errors --
    #[error("could not decode image: {0}")]
    DecodeError(String),

    #[error("step '{step}' failed: {message}")]
    ProcessingError { step: String, message: String },

    #[error("image encoding failed: {0}")]
    Encode(String),

    // -- Job lifecycle --
    #[error("job timed out after {:.1}s", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("job cancelled")]
    Cancelled,

    // -- Archives --
    #[error("no results to archive")]
    EmptyArchive,

    #[error("archive error: {0}")]
    Archive(String),

    // -- Storage / persistence --
    #[error("storage error: {0}")]
    Storage(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocpipeError>;

/// Coarse classification of an error, for callers that only need to know
/// whose fault it was (e.g. an HTTP layer picking a status code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed action string, id, or request.
    InvalidInput,
    /// Unknown job, result, or share token.
    NotFound,
    /// Uploaded bytes are not an image.
    Decode,
    /// A pipeline step failed, timed out, or was cancelled.
    Processing,
    /// Storage, encoding, or serialization failure on our side.
    Internal,
}

impl ErrorKind {
    /// HTTP status code conventionally returned for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::NotFound => 404,
            Self::Decode => 400,
            Self::Processing => 500,
            Self::Internal => 500,
        }
    }
}

impl DocpipeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) | Self::EmptyArchive => ErrorKind::NotFound,
            Self::DecodeError(_) => ErrorKind::Decode,
            Self::ProcessingError { .. } | Self::TimedOut(_) | Self::Cancelled => {
                ErrorKind::Processing
            }
            Self::Encode(_)
            | Self::Archive(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Build a `ProcessingError` for the named step.
    pub fn step(step: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ProcessingError {
            step: step.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_error_names_the_step() {
        let err = DocpipeError::step("dewarp", "no page edges");
        assert_eq!(err.to_string(), "step 'dewarp' failed: no page edges");
        assert_eq!(err.kind(), ErrorKind::Processing);
    }

    #[test]
    fn kinds_map_to_http_statuses() {
        assert_eq!(DocpipeError::InvalidInput("x".into()).kind().http_status(), 400);
        assert_eq!(DocpipeError::NotFound("x".into()).kind().http_status(), 404);
        assert_eq!(DocpipeError::EmptyArchive.kind().http_status(), 404);
        assert_eq!(DocpipeError::DecodeError("x".into()).kind().http_status(), 400);
        assert_eq!(DocpipeError::Storage("x".into()).kind().http_status(), 500);
    }

    #[test]
    fn timeout_message_reports_seconds() {
        let err = DocpipeError::TimedOut(Duration::from_secs(30));
        assert_eq!(err.to_string(), "job timed out after 30.0s");
    }
}
