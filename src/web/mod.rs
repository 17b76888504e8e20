//! Single-page web UI: upload a document, get a preview and a download.
//!
//! Routes:
//!
//! | Method | Path | |
//! |--------|------|-|
//! | `GET`  | `/` | upload form |
//! | `POST` | `/convert` | `multipart/form-data` with a `file` field |
//! | `GET`  | `/health` | `ok` |
//!
//! Each POST runs one [`Pipeline`] to completion and renders the same page
//! with either the preview or the error. No state survives the response.

pub mod page;

use crate::config::ByteSize;
use crate::convert::Pipeline;
use crate::error::Doc2MdError;
use crate::output::{PipelineOutcome, UploadRequest};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub use page::View;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Form field carrying the document.
const FILE_FIELD: &str = "file";

struct WebState {
    pipeline: Pipeline,
}

/// Build the axum router for `pipeline`.
pub fn router(pipeline: Pipeline) -> Router {
    let max = pipeline.config().max_upload.bytes();
    let body_limit = usize::try_from(max)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(serve_page))
        .route("/convert", get(serve_page).post(handle_convert))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(Arc::new(WebState { pipeline }))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(pipeline: Pipeline, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(
        addr = %local,
        max_upload = %pipeline.config().max_upload,
        converter = pipeline.converter_name(),
        "Document converter listening on http://{local}/"
    );

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
        })
        .await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn serve_page(State(state): State<Arc<WebState>>) -> Html<String> {
    Html(page::render(state.pipeline.config(), View::Empty))
}

async fn handle_convert(State(state): State<Arc<WebState>>, multipart: Multipart) -> Response {
    let limit = state.pipeline.config().max_upload;
    let request = match read_upload(multipart, limit).await {
        Ok(request) => request,
        Err(e) => return render_failure(&state, &e),
    };

    match state.pipeline.run(request).await {
        PipelineOutcome::Success(out) => {
            let html = page::render(state.pipeline.config(), View::Success(&out));
            (StatusCode::OK, Html(html)).into_response()
        }
        PipelineOutcome::Failed(e) => render_failure(&state, &e),
    }
}

fn render_failure(state: &WebState, error: &Doc2MdError) -> Response {
    let html = page::render(state.pipeline.config(), View::Failed(error));
    (status_for(error), Html(html)).into_response()
}

/// Pull the `file` part out of the form.
async fn read_upload(mut multipart: Multipart, limit: ByteSize) -> Result<UploadRequest, Doc2MdError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(Doc2MdError::MissingUpload),
            Err(e) => return Err(multipart_error(e, limit)),
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        // Browsers send an empty, nameless part when no file was chosen.
        if filename.is_empty() && bytes.is_empty() {
            return Err(Doc2MdError::MissingUpload);
        }
        return Ok(UploadRequest::new(filename, bytes.to_vec()));
    }
}

fn multipart_error(e: MultipartError, limit: ByteSize) -> Doc2MdError {
    // Over the body limit: report it the same way the stager would.
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Doc2MdError::SizeLimitExceeded { limit };
    }
    warn!("Failed to read upload: {e}");
    Doc2MdError::MalformedUpload {
        message: e.body_text(),
    }
}

/// HTTP status for a failed run.
pub fn status_for(error: &Doc2MdError) -> StatusCode {
    match error {
        Doc2MdError::SizeLimitExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Doc2MdError::MissingUpload | Doc2MdError::MalformedUpload { .. } => StatusCode::BAD_REQUEST,
        Doc2MdError::ConversionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Doc2MdError::ConversionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Doc2MdError::StagingIo { .. }
        | Doc2MdError::InputIo { .. }
        | Doc2MdError::CleanupFailed { .. }
        | Doc2MdError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
