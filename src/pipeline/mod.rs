//! Pipeline stages for upload-to-Markdown conversion.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! the others and the converter can be swapped without touching staging.
//!
//! ## Data Flow
//!
//! ```text
//! stage ──▶ adapter ──▶ present
//! (bytes)   (convert)   (preview + download)
//! ```
//!
//! 1. [`stage`]: enforce the size limit and write the upload to a unique
//!    temp file that keeps its extension
//! 2. [`adapter`]: run the external converter on the staged path; runs in
//!    `spawn_blocking` because converters are synchronous
//! 3. [`present`]: derive `<stem>.md` and base64-wrap the Markdown for a
//!    `data:` URI download
//!
//! Orchestration and cleanup live in [`crate::convert`].

pub mod adapter;
pub mod present;
pub mod stage;
