//! Error types for the edgequake-doc2md library.
//!
//! Every failure the upload pipeline can hit is a variant of [`Doc2MdError`].
//! The library never panics on user input and never lets one of these escape
//! the [`crate::convert::Pipeline`] boundary: the controller folds them into
//! [`crate::output::PipelineOutcome::Failed`] so the UI can show the message
//! and accept the next upload.
//!
//! [`Doc2MdError::CleanupFailed`] is the odd one out: it is logged and handed
//! to observers, but it never replaces the outcome the user already got.

use crate::config::ByteSize;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-doc2md library.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The upload is larger than the configured maximum. Nothing was staged.
    #[error("File size exceeds the maximum limit of {limit}")]
    SizeLimitExceeded { limit: ByteSize },

    /// The form was submitted without a file attached.
    #[error("No file provided. Choose a document to convert.")]
    MissingUpload,

    /// The upload form could not be parsed (truncated or malformed body).
    #[error("The upload could not be read: {message}")]
    MalformedUpload { message: String },

    /// A local input file could not be inspected or read.
    #[error("Failed to read '{path}': {source}")]
    InputIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Staging errors ────────────────────────────────────────────────────
    /// Writing the upload to temporary storage failed (disk full, permissions…).
    #[error("Error saving file: {source}")]
    StagingIo {
        #[source]
        source: std::io::Error,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The external converter rejected the document. `message` is verbatim.
    #[error("Error converting file: {message}")]
    ConversionFailed { message: String },

    /// The converter did not answer within the configured timeout.
    #[error("Error converting file: conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    // ── Cleanup errors ────────────────────────────────────────────────────
    /// A staged file could not be removed.
    #[error("Failed to remove staged file '{path}': {source}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2MdError {
    /// Short machine-readable code, used in logs and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Doc2MdError::SizeLimitExceeded { .. } => "SIZE_LIMIT_EXCEEDED",
            Doc2MdError::MissingUpload => "MISSING_UPLOAD",
            Doc2MdError::MalformedUpload { .. } => "MALFORMED_UPLOAD",
            Doc2MdError::InputIo { .. } => "INPUT_IO",
            Doc2MdError::StagingIo { .. } => "STAGING_IO",
            Doc2MdError::ConversionFailed { .. } => "CONVERSION_FAILED",
            Doc2MdError::ConversionTimeout { .. } => "CONVERSION_TIMEOUT",
            Doc2MdError::CleanupFailed { .. } => "CLEANUP_FAILED",
            Doc2MdError::Internal(_) => "INTERNAL",
        }
    }

    /// `true` when the user can fix the problem by choosing another file.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Doc2MdError::SizeLimitExceeded { .. }
                | Doc2MdError::MissingUpload
                | Doc2MdError::MalformedUpload { .. }
                | Doc2MdError::ConversionFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_display_mentions_megabytes() {
        let e = Doc2MdError::SizeLimitExceeded {
            limit: ByteSize::from_megabytes(5),
        };
        let msg = e.to_string();
        assert!(msg.contains("5MB"), "got: {msg}");
    }

    #[test]
    fn size_limit_display_fractional() {
        let e = Doc2MdError::SizeLimitExceeded {
            limit: ByteSize(1024 * 1024 + 512 * 1024),
        };
        assert!(e.to_string().contains("1.5MB"));
    }

    #[test]
    fn conversion_failed_keeps_message_verbatim() {
        let e = Doc2MdError::ConversionFailed {
            message: "RTF header missing".into(),
        };
        assert_eq!(e.to_string(), "Error converting file: RTF header missing");
        assert_eq!(e.code(), "CONVERSION_FAILED");
        assert!(e.is_user_recoverable());
    }

    #[test]
    fn staging_io_is_not_user_recoverable() {
        let e = Doc2MdError::StagingIo {
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.to_string().contains("disk full"));
        assert!(!e.is_user_recoverable());
    }

    #[test]
    fn malformed_upload_is_user_recoverable() {
        let e = Doc2MdError::MalformedUpload {
            message: "incomplete field data".into(),
        };
        assert_eq!(e.code(), "MALFORMED_UPLOAD");
        assert!(e.is_user_recoverable());
        assert!(e.to_string().contains("incomplete field data"));
    }

    #[test]
    fn timeout_display() {
        let e = Doc2MdError::ConversionTimeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
