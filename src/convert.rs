//! The application controller: one upload in, one outcome out.
//!
//! [`Pipeline::run`] drives a single upload through the state machine
//!
//! ```text
//! Idle ─▶ Staged ─▶ Converting ─▶ Success ─┐
//!   │                    │                  ├─▶ Idle
//!   └──── (validation) ──┴─────▶ Failed ────┘
//! ```
//!
//! and always comes back to `Idle`. Every error is folded into
//! [`PipelineOutcome::Failed`]; nothing escapes to the hosting runtime.
//! The staged file is removed exactly once on every terminal path.
//!
//! A `Pipeline` is immutable and cheap to clone, so the web server shares one
//! across all sessions. Concurrent runs never share a staged file.

use crate::config::UploadConfig;
use crate::error::Doc2MdError;
use crate::output::{ConversionOutput, ConversionStats, PipelineOutcome, UploadRequest};
use crate::pipeline::adapter::{ConversionAdapter, DocumentConverter};
use crate::pipeline::{present, stage};
use crate::progress::{Observer, PipelineState};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Upload → staged file → Markdown → download, with guaranteed cleanup.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<UploadConfig>,
    adapter: ConversionAdapter,
    observer: Option<Observer>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("adapter", &self.adapter)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl Pipeline {
    /// Pipeline using the command-line converter named in `config`.
    pub fn new(config: UploadConfig) -> Self {
        let adapter = ConversionAdapter::from_config(&config.converter);
        Self {
            config: Arc::new(config),
            adapter,
            observer: None,
        }
    }

    /// Replace the converter, keeping the configured timeout.
    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.adapter =
            ConversionAdapter::new(converter).with_timeout(self.config.converter.timeout_secs);
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn converter_name(&self) -> &str {
        self.adapter.converter_name()
    }

    /// Run one upload to completion.
    ///
    /// Never fails: errors are reported through [`PipelineOutcome::Failed`].
    pub async fn run(&self, request: UploadRequest) -> PipelineOutcome {
        let total_start = Instant::now();
        info!(
            "Starting conversion: '{}' ({} bytes)",
            request.filename(),
            request.len()
        );

        let mut outcome = self.run_to_terminal(request).await;

        match &mut outcome {
            PipelineOutcome::Success(out) => {
                out.stats.total_ms = total_start.elapsed().as_millis() as u64;
                info!(
                    "Conversion complete: '{}' → '{}', {} bytes, {}ms total",
                    out.source_filename,
                    out.artifact.filename,
                    out.stats.markdown_bytes,
                    out.stats.total_ms
                );
            }
            PipelineOutcome::Failed(e) => {
                warn!(code = e.code(), "Conversion failed: {e}");
            }
        }

        self.notify(PipelineState::Idle);
        outcome
    }

    /// Blocking wrapper around [`Pipeline::run`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from async code.
    pub fn run_blocking(&self, request: UploadRequest) -> PipelineOutcome {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.run(request)),
            Err(e) => PipelineOutcome::Failed(Doc2MdError::Internal(format!(
                "Failed to create tokio runtime: {e}"
            ))),
        }
    }

    async fn run_to_terminal(&self, request: UploadRequest) -> PipelineOutcome {
        let source_filename = request.filename().to_string();
        let input_bytes = request.len();

        // ── Step 1: Validate + stage ─────────────────────────────────────────
        let staging_start = Instant::now();
        let config = Arc::clone(&self.config);
        let staged = match tokio::task::spawn_blocking(move || stage::stage_upload(&request, &config))
            .await
        {
            Ok(Ok(staged)) => staged,
            Ok(Err(e)) => return self.fail(e),
            Err(e) => {
                return self.fail(Doc2MdError::Internal(format!("Staging task panicked: {e}")))
            }
        };
        let staging_ms = staging_start.elapsed().as_millis() as u64;
        self.notify(PipelineState::Staged);

        // ── Step 2: Convert ──────────────────────────────────────────────────
        self.notify(PipelineState::Converting);
        let conversion_start = Instant::now();
        let converted = self.adapter.convert(&staged).await;
        let conversion_ms = conversion_start.elapsed().as_millis() as u64;

        // ── Step 3: Present ──────────────────────────────────────────────────
        let outcome = match converted {
            Ok(markdown) => {
                let artifact = present::build_artifact(&markdown, &source_filename);
                self.notify(PipelineState::Success);
                PipelineOutcome::Success(ConversionOutput {
                    stats: ConversionStats {
                        input_bytes,
                        markdown_bytes: markdown.len() as u64,
                        staging_ms,
                        conversion_ms,
                        total_ms: 0,
                    },
                    source_filename,
                    markdown,
                    artifact,
                })
            }
            Err(e) => self.fail(e),
        };

        // ── Step 4: Cleanup, on both paths ───────────────────────────────────
        self.cleanup(staged);
        outcome
    }

    fn fail(&self, error: Doc2MdError) -> PipelineOutcome {
        self.notify(PipelineState::Failed);
        PipelineOutcome::Failed(error)
    }

    fn cleanup(&self, staged: stage::StagedFile) {
        if let Err(e) = staged.remove() {
            warn!("{e}");
            if let Some(ref obs) = self.observer {
                obs.on_cleanup_error(&e);
            }
        }
    }

    fn notify(&self, state: PipelineState) {
        if let Some(ref obs) = self.observer {
            obs.on_state(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::adapter::ConversionFailure;
    use crate::progress::PipelineObserver;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<PipelineState>>,
        cleanup_errors: Mutex<Vec<String>>,
    }

    impl PipelineObserver for Recorder {
        fn on_state(&self, state: PipelineState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_cleanup_error(&self, error: &Doc2MdError) {
            self.cleanup_errors.lock().unwrap().push(error.to_string());
        }
    }

    fn pipeline(dir: &TempDir, max_bytes: u64, converter: Arc<dyn DocumentConverter>) -> (Pipeline, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = UploadConfig::builder()
            .max_upload_bytes(max_bytes)
            .staging_dir(dir.path())
            .build();
        let p = Pipeline::new(config)
            .with_converter(converter)
            .with_observer(recorder.clone() as Observer);
        (p, recorder)
    }

    fn staged_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn success_walks_every_state_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let seen: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        let converter = Arc::new(move |p: &Path| -> Result<String, ConversionFailure> {
            *seen_in.lock().unwrap() = Some(p.to_path_buf());
            Ok("# Report\n".to_string())
        });
        let (p, rec) = pipeline(&dir, 1024, converter);

        let outcome = p.run(UploadRequest::new("report.docx", b"PK\x03\x04".to_vec())).await;
        let out = outcome.into_result().expect("should succeed");

        assert_eq!(out.markdown, "# Report\n");
        assert_eq!(out.artifact.filename, "report.md");
        assert_eq!(out.stats.input_bytes, 4);
        assert_eq!(out.stats.markdown_bytes, 9);
        assert_eq!(
            *rec.states.lock().unwrap(),
            vec![
                PipelineState::Staged,
                PipelineState::Converting,
                PipelineState::Success,
                PipelineState::Idle
            ]
        );

        let staged_path = seen.lock().unwrap().clone().expect("converter saw a path");
        assert!(staged_path.to_string_lossy().ends_with(".docx"));
        assert!(!staged_path.exists());
        assert_eq!(staged_count(&dir), 0);
    }

    #[tokio::test]
    async fn oversize_never_reaches_converting() {
        let dir = TempDir::new().unwrap();
        let converter = Arc::new(|_: &Path| -> Result<String, ConversionFailure> {
            panic!("converter must not run for oversize uploads")
        });
        let (p, rec) = pipeline(&dir, 4, converter);

        let outcome = p.run(UploadRequest::new("huge.pdf", vec![0u8; 5])).await;
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed(Doc2MdError::SizeLimitExceeded { .. })
        ));
        assert_eq!(
            *rec.states.lock().unwrap(),
            vec![PipelineState::Failed, PipelineState::Idle]
        );
        assert_eq!(staged_count(&dir), 0);
    }

    #[tokio::test]
    async fn conversion_failure_still_cleans_up() {
        let dir = TempDir::new().unwrap();
        let converter = Arc::new(|_: &Path| -> Result<String, ConversionFailure> {
            Err(ConversionFailure::new("not an RTF document"))
        });
        let (p, rec) = pipeline(&dir, 1024, converter);

        let outcome = p.run(UploadRequest::new("bad.rtf", b"garbage".to_vec())).await;
        match outcome {
            PipelineOutcome::Failed(Doc2MdError::ConversionFailed { message }) => {
                assert_eq!(message, "not an RTF document")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            *rec.states.lock().unwrap(),
            vec![
                PipelineState::Staged,
                PipelineState::Converting,
                PipelineState::Failed,
                PipelineState::Idle
            ]
        );
        assert_eq!(staged_count(&dir), 0);
    }

    #[tokio::test]
    async fn cleanup_failure_does_not_mask_success() {
        let dir = TempDir::new().unwrap();
        // A converter that deletes its input makes the later removal fail.
        let converter = Arc::new(|p: &Path| -> Result<String, ConversionFailure> {
            std::fs::remove_file(p).map_err(|e| ConversionFailure::new(e.to_string()))?;
            Ok("text".to_string())
        });
        let (p, rec) = pipeline(&dir, 1024, converter);

        let outcome = p.run(UploadRequest::new("a.txt", b"text".to_vec())).await;
        assert!(outcome.is_success());
        let errors = rec.cleanup_errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Failed to remove staged file"));
    }

    #[tokio::test]
    async fn staging_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig::builder()
            .staging_dir(dir.path().join("missing"))
            .build();
        let p = Pipeline::new(config).with_converter(Arc::new(
            |_: &Path| -> Result<String, ConversionFailure> { Ok(String::new()) },
        ));

        let outcome = p.run(UploadRequest::new("a.txt", b"x".to_vec())).await;
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed(Doc2MdError::StagingIo { .. })
        ));
    }

    #[test]
    fn run_blocking_outside_runtime() {
        let dir = TempDir::new().unwrap();
        let (p, _) = pipeline(
            &dir,
            1024,
            Arc::new(|_: &Path| -> Result<String, ConversionFailure> { Ok("ok".into()) }),
        );
        let out = p
            .run_blocking(UploadRequest::new("x.html", b"<p>ok</p>".to_vec()))
            .into_result()
            .unwrap();
        assert_eq!(out.markdown, "ok");
        assert_eq!(out.artifact.filename, "x.md");
    }
}
