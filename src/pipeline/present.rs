//! Result presentation: Markdown → preview text + self-contained download.
//!
//! The download is embedded as a base64 `data:` URI so the browser can save
//! it without a second request; the server keeps nothing once the response
//! is sent. Standard-alphabet base64 is binary-safe for any UTF-8 input.

use crate::output::DownloadArtifact;
use crate::pipeline::stage::base_name;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// MIME type of the downloadable Markdown.
pub const MARKDOWN_MIME: &str = "text/markdown";

/// Stem used when the upload's name has none (`.md`, empty, …).
const FALLBACK_STEM: &str = "document";

/// `report.docx` → `report.md`.
///
/// Only the final extension is stripped (`a.tar.gz` → `a.tar.md`), and any
/// client-side directory prefix is ignored.
pub fn output_filename(original: &str) -> String {
    format!("{}.md", file_stem(original))
}

/// Filename without directory and final extension, never empty.
pub fn file_stem(original: &str) -> &str {
    let name = base_name(original);
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    };
    // Dot-files like `.profile` keep their full name as the stem, which is
    // fine; only a fully empty stem needs the fallback.
    let stem = stem.trim();
    if stem.is_empty() || stem == "." || stem == ".." {
        FALLBACK_STEM
    } else {
        stem
    }
}

/// Encode `markdown` as a download named after `original_filename`.
pub fn build_artifact(markdown: &str, original_filename: &str) -> DownloadArtifact {
    let payload_base64 = STANDARD.encode(markdown.as_bytes());
    let filename = output_filename(original_filename);
    debug!(
        "Built download '{}' → {} bytes base64",
        filename,
        payload_base64.len()
    );
    DownloadArtifact {
        filename,
        mime_type: MARKDOWN_MIME,
        payload_base64,
    }
}
