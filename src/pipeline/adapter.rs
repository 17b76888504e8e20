//! Conversion adapter: staged file path → Markdown, via an external converter.
//!
//! The actual format parsing is somebody else's problem. [`DocumentConverter`]
//! is the seam: anything that can turn a path into Markdown (a subprocess, an
//! FFI binding, a closure in a test) plugs in here. The adapter only adds the
//! async plumbing around it.
//!
//! ## Blocking converters vs. subprocesses
//!
//! In-process converters are synchronous and may take seconds on a large PDF,
//! so they run on tokio's blocking pool. A thread cannot be stopped, so on
//! timeout such a converter is abandoned and finishes on its own.
//!
//! [`MarkitdownCli`] gets its own path: the child is driven by
//! `tokio::process` and killed (and reaped) the moment the timeout fires, so a
//! hung converter holds neither a pool thread nor the staged file.
//!
//! Failures are opaque: whatever message the converter produced is handed to
//! the user verbatim. There are no retries; conversion is deterministic.

use crate::config::ConverterConfig;
use crate::error::Doc2MdError;
use crate::pipeline::stage::StagedFile;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// A converter's own description of why it could not convert a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConversionFailure {
    pub message: String,
}

impl ConversionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Anything that can turn a document on disk into Markdown text.
///
/// Implementations must only read `path`; deleting it is the pipeline's job.
pub trait DocumentConverter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }

    fn convert(&self, path: &Path) -> Result<String, ConversionFailure>;
}

impl<F> DocumentConverter for F
where
    F: Fn(&Path) -> Result<String, ConversionFailure> + Send + Sync,
{
    fn convert(&self, path: &Path) -> Result<String, ConversionFailure> {
        self(path)
    }
}

/// Runs a command-line converter (`markitdown <path>` by default) and reads
/// Markdown from its stdout.
#[derive(Debug, Clone)]
pub struct MarkitdownCli {
    program: String,
    args: Vec<String>,
}

impl MarkitdownCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.program.clone()).with_args(config.args.iter().cloned())
    }

    fn spawn_failure(&self, e: std::io::Error) -> ConversionFailure {
        match e.kind() {
            std::io::ErrorKind::NotFound => ConversionFailure::new(format!(
                "converter '{}' was not found; install it or set DOC2MD_CONVERTER",
                self.program
            )),
            _ => ConversionFailure::new(format!("failed to run converter '{}': {e}", self.program)),
        }
    }

    fn exit_failure(&self, status: ExitStatus, stderr: &[u8]) -> ConversionFailure {
        let stderr = String::from_utf8_lossy(stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            ConversionFailure::new(format!("converter '{}' exited with {status}", self.program))
        } else {
            ConversionFailure::new(stderr)
        }
    }

    /// Run the converter as a child process, killing it if `timeout_secs`
    /// elapses first.
    async fn run(&self, path: &Path, timeout_secs: Option<u64>) -> Result<String, Doc2MdError> {
        let failed = |f: ConversionFailure| Doc2MdError::ConversionFailed { message: f.message };

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(self.spawn_failure(e)))?;

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            return Err(Doc2MdError::Internal(
                "converter output pipes were not captured".into(),
            ));
        };

        let finished = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (read_out, read_err, status) = tokio::join!(
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err),
                child.wait()
            );
            read_out?;
            read_err?;
            Ok::<_, std::io::Error>((status?, out, err))
        };

        let outcome = match timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), finished)
                .await
                .map_err(|_| secs),
            None => Ok(finished.await),
        };

        let (status, out, err) = match outcome {
            Ok(result) => result.map_err(|e| Doc2MdError::ConversionFailed {
                message: format!("failed to read output of converter '{}': {e}", self.program),
            })?,
            Err(secs) => {
                warn!("Converter '{}' timed out after {secs}s; killing it", self.program);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill converter '{}': {e}", self.program);
                }
                return Err(Doc2MdError::ConversionTimeout { secs });
            }
        };

        if !status.success() {
            return Err(failed(self.exit_failure(status, &err)));
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl DocumentConverter for MarkitdownCli {
    fn name(&self) -> &str {
        &self.program
    }

    fn convert(&self, path: &Path) -> Result<String, ConversionFailure> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_failure(e))?;

        if !output.status.success() {
            return Err(self.exit_failure(output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Clone)]
enum Backend {
    Blocking(Arc<dyn DocumentConverter>),
    Process(Arc<MarkitdownCli>),
}

/// Async wrapper that runs a converter against a [`StagedFile`].
#[derive(Clone)]
pub struct ConversionAdapter {
    backend: Backend,
    timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ConversionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionAdapter")
            .field("converter", &self.converter_name())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ConversionAdapter {
    /// Adapter for an in-process converter, run on the blocking pool.
    pub fn new(converter: Arc<dyn DocumentConverter>) -> Self {
        Self {
            backend: Backend::Blocking(converter),
            timeout_secs: None,
        }
    }

    /// Adapter for a command-line converter; the child is killed on timeout.
    pub fn process(cli: MarkitdownCli) -> Self {
        Self {
            backend: Backend::Process(Arc::new(cli)),
            timeout_secs: None,
        }
    }

    /// Adapter for the command-line converter described by `config`.
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::process(MarkitdownCli::from_config(config)).with_timeout(config.timeout_secs)
    }

    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn converter_name(&self) -> &str {
        match &self.backend {
            Backend::Blocking(converter) => converter.name(),
            Backend::Process(cli) => cli.name(),
        }
    }

    /// Convert the staged document. Never deletes or modifies it.
    ///
    /// # Errors
    /// * [`Doc2MdError::ConversionFailed`]: the converter's message, verbatim.
    /// * [`Doc2MdError::ConversionTimeout`]: the configured timeout elapsed.
    pub async fn convert(&self, staged: &StagedFile) -> Result<String, Doc2MdError> {
        info!("Converting {} with '{}'", staged.path().display(), self.converter_name());

        let markdown = match &self.backend {
            Backend::Process(cli) => cli.run(staged.path(), self.timeout_secs).await?,
            Backend::Blocking(converter) => {
                self.convert_blocking(Arc::clone(converter), staged).await?
            }
        };

        debug!("Converter produced {} bytes of Markdown", markdown.len());
        Ok(markdown)
    }

    async fn convert_blocking(
        &self,
        converter: Arc<dyn DocumentConverter>,
        staged: &StagedFile,
    ) -> Result<String, Doc2MdError> {
        let path = staged.path().to_path_buf();
        let task = tokio::task::spawn_blocking(move || converter.convert(&path));

        let joined = match self.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), task)
                .await
                .map_err(|_| Doc2MdError::ConversionTimeout { secs })?,
            None => task.await,
        };

        joined
            .map_err(|e| Doc2MdError::ConversionFailed {
                message: format!("converter crashed: {e}"),
            })?
            .map_err(|failure| Doc2MdError::ConversionFailed {
                message: failure.message,
            })
    }
}
