//! HTTP API server.
//!
//! Exposes the ingestion pipeline over JSON/multipart endpoints. Handlers
//! only translate pipeline outcomes into status codes and signal bodies;
//! all decisions live in the pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/data/upload/{project_id}` | Multipart file upload (`file` field) |
//! | `POST` | `/data/process/{project_id}` | Chunk a stored file and persist the chunks |
//! | `GET`  | `/projects` | List projects (paged) |
//! | `GET`  | `/health` | Health check (returns name + version) |
//!
//! # Response contract
//!
//! Upload and process responses always carry a `signal` string from the
//! fixed vocabulary. Success:
//!
//! ```json
//! { "signal": "file uploaded successfully", "file_id": "k3v09qbd21xu_notes.txt" }
//! { "signal": "file processing successful", "inserted_chunks": 12 }
//! ```
//!
//! Failures answer `400` with `{ "signal": "..." }` naming the reason.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::pipeline::{self, ProcessError, Upload, UploadError};
use crate::signal::Signal;
use crate::store;
use crate::validate;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
}

/// Starts the API server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Multipart framing needs headroom above the raw file ceiling; the
    // pipeline enforces the real limit as bytes arrive.
    let body_limit = validate::max_bytes(&state.config.upload) as usize + 1024 * 1024;

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/projects", get(handle_list_projects))
        .route("/data/upload/{project_id}", post(handle_upload))
        .route("/data/process/{project_id}", post(handle_process))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state);

    info!("ragdepot API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// A failed request: status code plus the wire signal for the body.
struct SignalReject {
    status: StatusCode,
    signal: Signal,
}

impl IntoResponse for SignalReject {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "signal": self.signal.as_str() }))).into_response()
    }
}

fn bad_request(signal: Signal) -> SignalReject {
    SignalReject {
        status: StatusCode::BAD_REQUEST,
        signal,
    }
}

// ============ GET /health ============

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "app_name": env!("CARGO_PKG_NAME"),
        "app_version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============ GET /projects ============

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<i64>,
    page_size: Option<i64>,
}

async fn handle_list_projects(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, StatusCode> {
    let (projects, total_pages) = store::list_projects(
        &state.pool,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(10),
    )
    .await
    .map_err(|err| {
        error!(error = %err, "listing projects failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let projects: Vec<Value> = projects
        .iter()
        .map(|p| json!({ "project_id": p.project_id, "created_at": p.created_at }))
        .collect();
    Ok(Json(json!({
        "projects": projects,
        "total_pages": total_pages,
    })))
}

// ============ POST /data/upload/{project_id} ============

/// Streams the multipart `file` field through the upload flow. The field's
/// size is unknown upfront, so the ceiling is enforced as bytes arrive.
async fn handle_upload(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, SignalReject> {
    loop {
        let field = multipart.next_field().await.map_err(|err| {
            error!(error = %err, project = %project_id, "reading multipart body failed");
            bad_request(Signal::UploadFailed)
        })?;
        let mut field = match field {
            Some(field) => field,
            None => break,
        };
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut upload = Upload::start(
            &state.config,
            &state.pool,
            &project_id,
            &original_name,
            &content_type,
            None,
        )
        .await
        .map_err(|err| reject_upload(&project_id, err))?;

        while let Some(bytes) = field.chunk().await.map_err(|err| {
            error!(error = %err, project = %project_id, "reading upload bytes failed");
            bad_request(Signal::UploadFailed)
        })? {
            upload
                .push(&bytes)
                .await
                .map_err(|err| reject_upload(&project_id, err))?;
        }

        let outcome = upload
            .finish(&state.pool)
            .await
            .map_err(|err| reject_upload(&project_id, err))?;
        return Ok(Json(json!({
            "signal": Signal::UploadSuccess.as_str(),
            "file_id": outcome.file_id,
        })));
    }

    // No `file` field in the request.
    Err(bad_request(Signal::UploadFailed))
}

fn reject_upload(project_id: &str, err: UploadError) -> SignalReject {
    error!(error = %err, project = %project_id, "upload failed");
    bad_request(err.signal())
}

// ============ POST /data/process/{project_id} ============

#[derive(Debug, Deserialize)]
struct ProcessBody {
    file_id: String,
    chunk_size: Option<usize>,
    overlap_size: Option<usize>,
    /// 1 requests a reset of the project's existing chunks.
    #[serde(default)]
    do_reset: i64,
}

async fn handle_process(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<ProcessBody>,
) -> Result<Json<Value>, SignalReject> {
    let outcome = pipeline::run_process(
        &state.config,
        &state.pool,
        &project_id,
        &body.file_id,
        body.chunk_size,
        body.overlap_size,
        body.do_reset == 1,
    )
    .await
    .map_err(|err: ProcessError| {
        error!(error = %err, project = %project_id, file = %body.file_id, "processing failed");
        bad_request(err.signal())
    })?;

    Ok(Json(json!({
        "signal": Signal::ProcessingSuccess.as_str(),
        "inserted_chunks": outcome.inserted_chunks,
    })))
}
