//! Configuration types for the upload-and-convert pipeline.
//!
//! Everything the pipeline needs to know is carried by [`UploadConfig`],
//! built once at startup (usually via [`UploadConfig::from_env`]) and then
//! passed by reference. Nothing in the library reads the environment after
//! that point, so two pipelines with different limits can live in the same
//! process (the test suite relies on this).
//!
//! # Environment
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `MAX_UPLOAD_SIZE` | `5` | Maximum upload size in megabytes |
//! | `DOC2MD_CONVERTER` | `markitdown` | External converter program |
//! | `DOC2MD_CONVERT_TIMEOUT` | unset | Converter timeout in seconds |
//! | `DOC2MD_STAGING_DIR` | system temp dir | Where uploads are staged |
//!
//! Malformed values fall back to the default silently. A `.env` file in the
//! working directory is honoured via [`load_dotenv`]; variables already set
//! in the process environment win over it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable holding the upload limit in megabytes.
pub const MAX_UPLOAD_SIZE_ENV: &str = "MAX_UPLOAD_SIZE";
/// Environment variable naming the converter program.
pub const CONVERTER_ENV: &str = "DOC2MD_CONVERTER";
/// Environment variable holding the converter timeout in seconds.
pub const CONVERT_TIMEOUT_ENV: &str = "DOC2MD_CONVERT_TIMEOUT";
/// Environment variable overriding the staging directory.
pub const STAGING_DIR_ENV: &str = "DOC2MD_STAGING_DIR";

/// Upload limit used when `MAX_UPLOAD_SIZE` is absent or unparseable.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 5;
/// Converter program used when `DOC2MD_CONVERTER` is absent.
pub const DEFAULT_CONVERTER: &str = "markitdown";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A byte count that displays itself in megabytes (`5MB`, `1.5MB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn from_megabytes(mb: u64) -> Self {
        Self(mb.saturating_mul(BYTES_PER_MB))
    }

    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % BYTES_PER_MB == 0 {
            write!(f, "{}MB", self.0 / BYTES_PER_MB)
        } else {
            let mb = self.0 as f64 / BYTES_PER_MB as f64;
            let s = format!("{mb:.2}");
            write!(f, "{}MB", s.trim_end_matches('0').trim_end_matches('.'))
        }
    }
}

/// How to invoke the external document-to-Markdown converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Program to run. Receives the staged file path as its last argument
    /// and must print Markdown on stdout.
    pub program: String,

    /// Extra arguments placed before the path.
    pub args: Vec<String>,

    /// Give up waiting after this many seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_CONVERTER.to_string(),
            args: Vec::new(),
            timeout_secs: None,
        }
    }
}

/// Configuration for one upload pipeline.
///
/// # Example
/// ```rust
/// use edgequake_doc2md::UploadConfig;
///
/// let config = UploadConfig::builder()
///     .max_upload_mb(10)
///     .converter_program("markitdown")
///     .build();
/// assert_eq!(config.max_upload.bytes(), 10 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted upload. Default: 5 MB.
    pub max_upload: ByteSize,

    /// Directory for staged uploads. `None` uses the system temp directory.
    pub staging_dir: Option<PathBuf>,

    /// External converter invocation.
    pub converter: ConverterConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload: ByteSize::from_megabytes(DEFAULT_MAX_UPLOAD_MB),
            staging_dir: None,
            converter: ConverterConfig::default(),
        }
    }
}

impl UploadConfig {
    /// Create a new builder for `UploadConfig`.
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        let max_mb = std::env::var(MAX_UPLOAD_SIZE_ENV).ok();
        let program = std::env::var(CONVERTER_ENV).ok();
        let timeout = std::env::var(CONVERT_TIMEOUT_ENV).ok();
        let staging_dir = std::env::var_os(STAGING_DIR_ENV).filter(|d| !d.is_empty());

        let mut builder = Self::builder()
            .max_upload_mb(parse_max_upload_mb(max_mb.as_deref()))
            .converter_timeout_secs(parse_timeout_secs(timeout.as_deref()));
        if let Some(p) = program.filter(|p| !p.trim().is_empty()) {
            builder = builder.converter_program(p.trim());
        }
        if let Some(dir) = staging_dir {
            builder = builder.staging_dir(dir);
        }
        builder.build()
    }
}

/// Builder for [`UploadConfig`].
#[derive(Debug)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    pub fn max_upload_mb(mut self, mb: u64) -> Self {
        self.config.max_upload = ByteSize::from_megabytes(mb);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload = ByteSize(bytes);
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter.program = program.into();
        self
    }

    pub fn converter_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.converter.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn converter_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.converter.timeout_secs = secs.filter(|s| *s > 0);
        self
    }

    pub fn build(self) -> UploadConfig {
        self.config
    }
}

/// Load `.env` from the working directory (or a parent) into the process
/// environment without overriding variables that are already set.
///
/// Returns the file that was loaded, or `None` when there is none. Call it
/// before anything reads the environment.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Like [`load_dotenv`] for an explicit file.
pub fn load_env_file(path: &Path) -> Result<(), dotenvy::Error> {
    dotenvy::from_path(path)
}

/// Parse a `MAX_UPLOAD_SIZE` value, falling back to the 5 MB default.
pub fn parse_max_upload_mb(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_UPLOAD_MB)
}

/// Parse a `DOC2MD_CONVERT_TIMEOUT` value; zero and garbage mean "no timeout".
pub fn parse_timeout_secs(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|s| *s > 0)
}
