//! Request-scoped data types flowing through the pipeline.
//!
//! None of these outlive a single upload: an [`UploadRequest`] goes in, a
//! [`PipelineOutcome`] comes out, and everything in between is dropped when
//! the controller returns.

use crate::error::Doc2MdError;
use serde::Serialize;

/// A document the user selected for conversion.
#[derive(Clone)]
pub struct UploadRequest {
    filename: String,
    bytes: Vec<u8>,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Original filename as supplied by the client, extension included.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A self-contained Markdown download: filename plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadArtifact {
    /// Suggested filename, always `<stem>.md`.
    pub filename: String,
    /// MIME type used in the `data:` URI.
    pub mime_type: &'static str,
    /// Base64 of the UTF-8 Markdown text.
    pub payload_base64: String,
}

impl DownloadArtifact {
    /// `data:text/markdown;base64,…` URI suitable for an `<a download>` link.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload_base64)
    }
}

/// Timing and size figures for one successful conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Size of the uploaded document.
    pub input_bytes: u64,
    /// Size of the produced Markdown (UTF-8 bytes).
    pub markdown_bytes: u64,
    /// Time spent writing the staged file.
    pub staging_ms: u64,
    /// Time spent inside the external converter.
    pub conversion_ms: u64,
    /// Wall-clock time for the whole pipeline.
    pub total_ms: u64,
}

/// The successful result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Original upload filename.
    pub source_filename: String,
    /// Full Markdown text; previews must not truncate what gets downloaded.
    pub markdown: String,
    pub artifact: DownloadArtifact,
    pub stats: ConversionStats,
}

/// Terminal result of a pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Success(ConversionOutput),
    Failed(Doc2MdError),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    /// Convert into a `Result` for callers that prefer `?`.
    pub fn into_result(self) -> Result<ConversionOutput, Doc2MdError> {
        match self {
            PipelineOutcome::Success(out) => Ok(out),
            PipelineOutcome::Failed(e) => Err(e),
        }
    }
}
