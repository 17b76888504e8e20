//! Observer trait for pipeline state changes.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via [`crate::convert::Pipeline::with_observer`]
//! to follow one upload through `Idle → Staged → Converting → Success | Failed → Idle`.
//! The CLI uses it to drive a spinner; the web UI does not need it because
//! the browser shows its own indicator while the request is in flight.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2md::{PipelineObserver, PipelineState};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<PipelineState>>,
//! }
//!
//! impl PipelineObserver for Recorder {
//!     fn on_state(&self, state: PipelineState) {
//!         self.seen.lock().unwrap().push(state);
//!     }
//! }
//! ```

use crate::error::Doc2MdError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where a single upload is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    /// Waiting for an upload.
    Idle,
    /// The upload passed validation and sits in a temp file.
    Staged,
    /// The external converter is running.
    Converting,
    /// Markdown is ready for preview and download.
    Success,
    /// Validation, staging, or conversion failed.
    Failed,
}

impl PipelineState {
    /// `Success` and `Failed` end a run; all per-request resources are
    /// released before the pipeline reports `Idle` again.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Success | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Staged => "staged",
            PipelineState::Converting => "converting",
            PipelineState::Success => "success",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as an upload moves between states.
///
/// Implementations must be `Send + Sync`: one observer may be shared by
/// concurrent requests. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called on every state transition, including the final return to `Idle`.
    fn on_state(&self, state: PipelineState) {
        let _ = state;
    }

    /// Called when a staged file could not be removed. The run's outcome is
    /// unaffected.
    fn on_cleanup_error(&self, error: &Doc2MdError) {
        let _ = error;
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Shared observer handle.
pub type Observer = Arc<dyn PipelineObserver>;
