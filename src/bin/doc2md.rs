//! CLI binary for edgequake-doc2md.
//!
//! A thin shim over the library crate: `serve` starts the single-page upload
//! UI, `convert` pushes a local file through the same pipeline and writes
//! the `<stem>.md` download next to you.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_doc2md::config::{load_dotenv, parse_max_upload_mb, parse_timeout_secs};
use edgequake_doc2md::{
    output_filename, read_local_upload, web, Doc2MdError, Pipeline, PipelineObserver, PipelineState,
    UploadConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI spinner driven by pipeline state ─────────────────────────────────────

/// Spinner shown while the converter runs; cleared on the terminal state.
struct CliSpinner {
    bar: ProgressBar,
}

impl CliSpinner {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliSpinner {
    fn on_state(&self, state: PipelineState) {
        match state {
            PipelineState::Staged => self.bar.set_message("File staged"),
            PipelineState::Converting => {
                self.bar.set_message("Converting document to Markdown...");
                self.bar.enable_steady_tick(Duration::from_millis(80));
            }
            PipelineState::Success | PipelineState::Failed => self.bar.finish_and_clear(),
            PipelineState::Idle => {}
        }
    }

    fn on_cleanup_error(&self, error: &Doc2MdError) {
        self.bar.println(format!("{}  {}", red("⚠"), error));
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the upload page on http://127.0.0.1:8501/
  doc2md serve

  # Allow 20 MB uploads and listen on all interfaces
  MAX_UPLOAD_SIZE=20 doc2md serve --bind 0.0.0.0:8501

  # Convert a file; writes report.md in the current directory
  doc2md convert report.docx

  # Print Markdown to stdout
  doc2md convert notes.rtf --stdout

SUPPORTED FORMATS:
  .docx  .pdf  .html  .txt  .rtf

ENVIRONMENT VARIABLES:
  MAX_UPLOAD_SIZE         Maximum upload size in MB (default 5)
  DOC2MD_CONVERTER        Converter program (default markitdown)
  DOC2MD_CONVERT_TIMEOUT  Converter timeout in seconds (default: none)
  DOC2MD_STAGING_DIR      Directory for staged uploads (default: system temp)
  DOC2MD_BIND             Listen address for `serve`
  Any of these may also be set in a .env file in the working directory.
  RUST_LOG                Log filter, overrides -v / -q

SETUP:
  The converter must accept a file path and print Markdown on stdout:
    pip install 'markitdown[all]'
"#;

/// Convert uploaded documents to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert DOCX, PDF, HTML, TXT and RTF documents to Markdown",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Maximum upload size in megabytes. Invalid values fall back to 5.
    #[arg(long, env = "MAX_UPLOAD_SIZE", global = true)]
    max_upload_size: Option<String>,

    /// Converter program; receives the document path as its last argument.
    #[arg(long, env = "DOC2MD_CONVERTER", global = true)]
    converter: Option<String>,

    /// Extra argument passed to the converter before the path (repeatable).
    #[arg(long = "converter-arg", global = true, allow_hyphen_values = true)]
    converter_args: Vec<String>,

    /// Converter timeout in seconds. Unset or 0 waits forever.
    #[arg(long, env = "DOC2MD_CONVERT_TIMEOUT", global = true)]
    timeout: Option<String>,

    /// Directory for staged uploads.
    #[arg(long, env = "DOC2MD_STAGING_DIR", global = true)]
    staging_dir: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload page.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "DOC2MD_BIND", default_value = "127.0.0.1:8501")]
        bind: SocketAddr,
    },
    /// Convert one local document.
    Convert {
        /// Document to convert.
        input: PathBuf,

        /// Write Markdown here instead of `<stem>.md` in the current directory.
        #[arg(short, long, conflicts_with = "stdout")]
        output: Option<PathBuf>,

        /// Print Markdown to stdout.
        #[arg(long)]
        stdout: bool,

        /// Print the full result (Markdown, download artifact, stats) as JSON.
        #[arg(long, conflicts_with_all = ["stdout", "output"])]
        json: bool,

        /// Disable the spinner.
        #[arg(long)]
        no_progress: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `env = ...` args see values from `.env`.
    let dotenv = load_dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        match cli.command {
            Command::Serve { .. } => "info",
            // The spinner and summary line cover the one-shot case.
            Command::Convert { .. } => "warn",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring .env: {e}"),
    }

    let config = build_config(&cli);

    match cli.command {
        Command::Serve { bind } => {
            let pipeline = Pipeline::new(config);
            if !cli.quiet {
                eprintln!(
                    "{}  {}  {}",
                    green("●"),
                    bold(&format!("http://{bind}/")),
                    dim(&format!(
                        "max {} · converter '{}'",
                        pipeline.config().max_upload,
                        pipeline.converter_name()
                    )),
                );
            }
            web::serve(pipeline, bind)
                .await
                .with_context(|| format!("Failed to serve on {bind}"))?;
        }
        Command::Convert {
            ref input,
            ref output,
            stdout,
            json,
            no_progress,
        } => {
            let show_progress = !cli.quiet && !no_progress && !json && !stdout;
            let mut pipeline = Pipeline::new(config);
            if show_progress {
                pipeline = pipeline.with_observer(CliSpinner::new());
            }
            run_convert(&pipeline, input, output.as_deref(), stdout, json, cli.quiet).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `UploadConfig`, with the same lenient parsing as
/// [`UploadConfig::from_env`].
fn build_config(cli: &Cli) -> UploadConfig {
    let mut builder = UploadConfig::builder()
        .max_upload_mb(parse_max_upload_mb(cli.max_upload_size.as_deref()))
        .converter_timeout_secs(parse_timeout_secs(cli.timeout.as_deref()))
        .converter_args(cli.converter_args.iter().cloned());

    if let Some(ref program) = cli.converter {
        if !program.trim().is_empty() {
            builder = builder.converter_program(program.trim());
        }
    }
    if let Some(ref dir) = cli.staging_dir {
        builder = builder.staging_dir(dir.clone());
    }
    builder.build()
}

async fn run_convert(
    pipeline: &Pipeline,
    input: &Path,
    output: Option<&Path>,
    stdout: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let request = read_local_upload(input, pipeline.config()).await?;

    let result = pipeline
        .run(request)
        .await
        .into_result()
        .context("Conversion failed")?;

    if json {
        let text = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        println!("{text}");
        return Ok(());
    }

    if stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !result.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        return Ok(());
    }

    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(output_filename(&result.source_filename)));
    write_atomic(&target, &result.markdown).await?;

    if !quiet {
        eprintln!(
            "{}  {}  →  {}  {}",
            green("✔"),
            result.source_filename,
            bold(&target.display().to_string()),
            dim(&format!(
                "{} bytes · {}ms",
                result.stats.markdown_bytes, result.stats.total_ms
            )),
        );
    }
    Ok(())
}

/// Write to a temp file beside `path`, then rename over it.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
