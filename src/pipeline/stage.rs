//! Upload validation and staging: raw bytes → uniquely named temp file.
//!
//! The external converter works on file paths and dispatches on the file
//! suffix, so an upload has to land on disk first. Each upload gets its own
//! `tempfile` entry (random name, `O_EXCL` creation) so concurrent sessions
//! never collide, and the original extension is kept as the suffix.
//!
//! The extension comes from the client and is only a routing hint. It is
//! normalised to lowercase ASCII alphanumerics before it touches the path;
//! anything else is dropped and the file is staged without a suffix.

use crate::config::UploadConfig;
use crate::error::Doc2MdError;
use crate::output::UploadRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Extensions offered by the upload form.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["docx", "pdf", "html", "txt", "rtf"];

const STAGING_PREFIX: &str = "doc2md-";

static SAFE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]{1,16}$").expect("valid regex"));

/// An upload written to temporary storage.
///
/// Owns the underlying temp file. [`StagedFile::remove`] deletes it and
/// reports failures; dropping an un-removed `StagedFile` deletes it silently,
/// which covers unwinding paths.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    len: u64,
    extension: Option<String>,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of bytes written.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Normalised extension used as the temp file suffix, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Delete the staged file. Consumes `self`, so it runs at most once.
    pub fn remove(self) -> Result<(), Doc2MdError> {
        let path = self.file.path().to_path_buf();
        self.file
            .close()
            .map_err(|source| Doc2MdError::CleanupFailed { path: path.clone(), source })?;
        debug!("Removed staged file: {}", path.display());
        Ok(())
    }
}

/// Validate an upload against the size limit and write it to temp storage.
///
/// Blocking: performs file I/O on the calling thread.
///
/// # Errors
/// * [`Doc2MdError::SizeLimitExceeded`]: nothing is written.
/// * [`Doc2MdError::StagingIo`]: the temp file could not be created or written;
///   any partially written file is removed before returning.
pub fn stage_upload(request: &UploadRequest, config: &UploadConfig) -> Result<StagedFile, Doc2MdError> {
    check_size(request.len(), config)?;

    let extension = staging_extension(request.filename());
    match extension.as_deref() {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext) => {}
        other => warn!(
            "Staging '{}' with unsupported extension {:?}",
            request.filename(),
            other
        ),
    }

    let suffix = extension
        .as_deref()
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_PREFIX).suffix(&suffix);
    let mut file = match config.staging_dir.as_deref() {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|source| Doc2MdError::StagingIo { source })?;

    // On error `file` is dropped here, which unlinks the partial write.
    file.write_all(request.bytes())
        .and_then(|_| file.flush())
        .map_err(|source| Doc2MdError::StagingIo { source })?;

    debug!(
        "Staged {} bytes from '{}' at {}",
        request.len(),
        request.filename(),
        file.path().display()
    );

    Ok(StagedFile {
        file,
        len: request.len(),
        extension,
    })
}

/// Read a local document as an upload, refusing it from its metadata before
/// any bytes are loaded when it is over the limit.
///
/// # Errors
/// * [`Doc2MdError::SizeLimitExceeded`]: the file was never read.
/// * [`Doc2MdError::InputIo`]: the file could not be inspected or read.
pub async fn read_local_upload(path: &Path, config: &UploadConfig) -> Result<UploadRequest, Doc2MdError> {
    let input_io = |source| Doc2MdError::InputIo {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(input_io)?;
    check_size(metadata.len(), config)?;

    let bytes = tokio::fs::read(path).await.map_err(input_io)?;
    // The file may have grown since the metadata call.
    check_size(bytes.len() as u64, config)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadRequest::new(filename, bytes))
}

/// Reject payloads above the configured maximum.
pub fn check_size(len: u64, config: &UploadConfig) -> Result<(), Doc2MdError> {
    if len > config.max_upload.bytes() {
        return Err(Doc2MdError::SizeLimitExceeded {
            limit: config.max_upload,
        });
    }
    Ok(())
}

/// Last path component of a client-supplied filename.
///
/// Browsers and CLI clients may send `C:\fakepath\report.docx` or
/// `dir/report.docx`; both separators are treated as path breaks.
pub fn base_name(filename: &str) -> &str {
    filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

/// Extension to use as the staging suffix, if it is safe to put in a path.
pub fn staging_extension(filename: &str) -> Option<String> {
    let ext = Path::new(base_name(filename))
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    SAFE_EXTENSION.is_match(&ext).then_some(ext)
}

/// Directory staged files are written to for this configuration.
pub fn staging_root(config: &UploadConfig) -> PathBuf {
    config
        .staging_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir, max_bytes: u64) -> UploadConfig {
        UploadConfig::builder()
            .max_upload_bytes(max_bytes)
            .staging_dir(dir.path())
            .build()
    }

    #[tokio::test]
    async fn local_upload_over_limit_is_refused_before_reading() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("huge.pdf");
        std::fs::File::create(&input).unwrap().set_len(6 * 1024 * 1024).unwrap();
        let config = UploadConfig::builder().max_upload_mb(5).build();

        match read_local_upload(&input, &config).await {
            Err(e @ Doc2MdError::SizeLimitExceeded { .. }) => assert!(e.to_string().contains("5MB")),
            other => panic!("expected SizeLimitExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn local_upload_under_limit_keeps_name_and_bytes() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, b"hello").unwrap();
        let config = UploadConfig::builder().max_upload_bytes(5).build();

        let request = read_local_upload(&input, &config).await.unwrap();
        assert_eq!(request.filename(), "notes.txt");
        assert_eq!(request.bytes(), b"hello");
    }

    #[tokio::test]
    async fn missing_local_upload_is_input_io() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("absent.docx");

        let err = read_local_upload(&input, &UploadConfig::default()).await.unwrap_err();
        assert!(matches!(err, Doc2MdError::InputIo { ref path, .. } if path == &input), "got {err:?}");
    }

    fn entries(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[test]
    fn stages_exact_bytes_with_extension() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1024);
        let req = UploadRequest::new("notes.TXT", b"hello world".to_vec());

        let staged = stage_upload(&req, &config).expect("staging should succeed");
        assert_eq!(staged.len(), 11);
        assert_eq!(staged.extension(), Some("txt"));
        assert!(staged.path().starts_with(dir.path()));
        assert!(staged.path().to_string_lossy().ends_with(".txt"));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"hello world");
    }

    #[test]
    fn oversize_upload_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 10);
        let req = UploadRequest::new("huge.pdf", vec![0u8; 11]);

        let err = stage_upload(&req, &config).unwrap_err();
        assert!(matches!(err, Doc2MdError::SizeLimitExceeded { .. }));
        assert_eq!(entries(&dir), 0);
    }

    #[test]
    fn upload_at_exact_limit_is_accepted() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 10);
        let req = UploadRequest::new("edge.pdf", vec![7u8; 10]);
        assert!(stage_upload(&req, &config).is_ok());
    }

    #[test]
    fn each_upload_gets_a_fresh_path() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1024);
        let req = UploadRequest::new("same.docx", b"x".to_vec());

        let a = stage_upload(&req, &config).unwrap();
        let b = stage_upload(&req, &config).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(entries(&dir), 2);
    }

    #[test]
    fn remove_deletes_the_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1024);
        let staged = stage_upload(&UploadRequest::new("a.rtf", b"{\\rtf1}".to_vec()), &config).unwrap();
        let path = staged.path().to_path_buf();

        staged.remove().expect("remove should succeed");
        assert!(!path.exists());
        assert_eq!(entries(&dir), 0);
    }

    #[test]
    fn drop_deletes_the_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1024);
        let staged = stage_upload(&UploadRequest::new("a.html", b"<p>".to_vec()), &config).unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn missing_staging_dir_is_staging_io() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig::builder()
            .staging_dir(dir.path().join("does-not-exist"))
            .build();
        let err = stage_upload(&UploadRequest::new("a.txt", b"x".to_vec()), &config).unwrap_err();
        assert!(matches!(err, Doc2MdError::StagingIo { .. }));
    }

    #[test]
    fn base_name_strips_client_paths() {
        assert_eq!(base_name("report.docx"), "report.docx");
        assert_eq!(base_name("C:\\fakepath\\report.docx"), "report.docx");
        assert_eq!(base_name("../../etc/report.docx"), "report.docx");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn staging_extension_rules() {
        assert_eq!(staging_extension("a.PDF").as_deref(), Some("pdf"));
        assert_eq!(staging_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(staging_extension("noext"), None);
        assert_eq!(staging_extension(".bashrc"), None);
        assert_eq!(staging_extension("evil.d/x"), None);
        assert_eq!(staging_extension("weird.p$f"), None);
    }
}
