//! # edgequake-doc2md
//!
//! Upload a document, get Markdown back: a single-page web tool (and a CLI)
//! that accepts DOCX, PDF, HTML, TXT or RTF files, converts them with an
//! external converter (`markitdown` by default), previews the result and
//! offers it as a `<stem>.md` download.
//!
//! ## Why this crate?
//!
//! Document parsing is a solved problem owned by dedicated converters. What
//! every wrapper around them gets wrong is the boring part: upload limits,
//! temp files that leak when the converter throws, and error messages that
//! vanish. This crate owns exactly that part and treats the converter as a
//! black box behind [`DocumentConverter`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Stage    size check, unique temp file keeping the extension
//!  ├─ 2. Convert  external converter on the staged path (spawn_blocking)
//!  ├─ 3. Present  preview + base64 data: URI download named <stem>.md
//!  └─ 4. Cleanup  staged file removed on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2md::{Pipeline, PipelineOutcome, UploadConfig, UploadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads MAX_UPLOAD_SIZE (MB, default 5) and DOC2MD_CONVERTER
//!     let pipeline = Pipeline::new(UploadConfig::from_env());
//!     let bytes = std::fs::read("report.docx")?;
//!     match pipeline.run(UploadRequest::new("report.docx", bytes)).await {
//!         PipelineOutcome::Success(out) => println!("{}", out.markdown),
//!         PipelineOutcome::Failed(e) => eprintln!("{e}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ByteSize, ConverterConfig, UploadConfig, UploadConfigBuilder};
pub use convert::Pipeline;
pub use error::Doc2MdError;
pub use output::{ConversionOutput, ConversionStats, DownloadArtifact, PipelineOutcome, UploadRequest};
pub use pipeline::adapter::{ConversionAdapter, ConversionFailure, DocumentConverter, MarkitdownCli};
pub use pipeline::present::output_filename;
pub use pipeline::stage::{read_local_upload, StagedFile, SUPPORTED_EXTENSIONS};
pub use progress::{NoopObserver, Observer, PipelineObserver, PipelineState};
