//! HTTP Server for the leaguegrid API.
//!
//! Uploads are multipart forms with a `file` field plus text fields.
//!
//! # API Endpoints
//!
//! | Method | Path            | Description                                   |
//! |--------|-----------------|-----------------------------------------------|
//! | GET    | `/health`       | Health check                                  |
//! | GET    | `/api/shapes`   | Known table shapes                            |
//! | POST   | `/api/extract`  | Extract a table (`shape`, `sort`, `direction`) |
//! | POST   | `/api/compare`  | Score matchups (`shape`, `stats`)             |
//! | GET    | `/api/logs`     | SSE stream for real-time logs                 |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::logs::LOG_BROADCASTER;
use super::types::{reject, ApiError, CompareResponse, ExtractResponse, ShapeSummary};
use crate::catalog::ShapeCatalog;
use crate::compare::matchup_report;
use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult, ShapeError};
use crate::models::Direction;
use crate::pipeline::{extract_bytes, Extraction};
use crate::rank::sort_table;

/// Shape used by `/api/compare` when the form names none.
const DEFAULT_COMPARE_SHAPE: &str = "league-matchups";

#[derive(Clone)]
struct AppState {
    catalog: Arc<ShapeCatalog>,
}

/// Build the router.
pub fn router(config: &AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let state = AppState {
        catalog: Arc::new(config.catalog()),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/shapes", get(list_shapes))
        .route("/api/extract", post(extract_upload))
        .route("/api/compare", post(compare_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(config.max_upload))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(&config);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, max_upload = config.max_upload, "leaguegrid server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "leaguegrid",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "shapes": "GET /api/shapes",
            "extract": "POST /api/extract",
            "compare": "POST /api/compare",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn list_shapes(State(state): State<AppState>) -> Json<Vec<ShapeSummary>> {
    Json(
        state
            .catalog
            .list()
            .into_iter()
            .map(|shape| ShapeSummary::new(shape, state.catalog.origin(&shape.name)))
            .collect(),
    )
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Uploads
// =============================================================================

/// Fields of an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    shape: Option<String>,
    sort: Option<String>,
    direction: Option<String>,
    stats: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            form.file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            form.file = Some(bytes.to_vec());
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
        match name.as_str() {
            "shape" => form.shape = text,
            "sort" => form.sort = text,
            "direction" => form.direction = text,
            "stats" => form.stats = text,
            other => warn!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// Run an extraction off the async runtime.
async fn run_extraction(state: &AppState, form: &mut UploadForm, shape_name: &str) -> ServerResult<Extraction> {
    let bytes = form
        .file
        .take()
        .ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    // Catalog names only, never file paths.
    let shape = state
        .catalog
        .get(shape_name)
        .cloned()
        .ok_or_else(|| ShapeError::UnknownShape(shape_name.to_string()))?;

    info!(
        file = form.file_name.as_deref().unwrap_or("unknown"),
        bytes = bytes.len(),
        shape = %shape.name,
        "new upload"
    );

    let extraction = tokio::task::spawn_blocking(move || extract_bytes(&bytes, &shape))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;
    Ok(extraction)
}

async fn extract_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    handle_extract(&state, multipart).await.map(Json).map_err(|e| {
        warn!(error = %e, "extract request failed");
        reject(e)
    })
}

async fn handle_extract(state: &AppState, multipart: Multipart) -> ServerResult<ExtractResponse> {
    let mut form = read_form(multipart).await?;
    let shape_name = form
        .shape
        .clone()
        .ok_or_else(|| ServerError::BadRequest("No shape provided".into()))?;
    let direction = match form.direction.as_deref() {
        Some(raw) => raw.parse::<Direction>().map_err(ServerError::BadRequest)?,
        None => Direction::Asc,
    };

    let mut extraction = run_extraction(state, &mut form, &shape_name).await?;
    if let Some(key) = &form.sort {
        if !extraction.table.has_header(key) {
            return Err(ServerError::BadRequest(format!("Unknown sort key: {}", key)));
        }
        sort_table(&mut extraction.table, key, direction);
    }
    Ok(ExtractResponse::from(extraction))
}

async fn compare_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CompareResponse>, ApiError> {
    handle_compare(&state, multipart).await.map(Json).map_err(|e| {
        warn!(error = %e, "compare request failed");
        reject(e)
    })
}

async fn handle_compare(state: &AppState, multipart: Multipart) -> ServerResult<CompareResponse> {
    let mut form = read_form(multipart).await?;
    let shape_name = form
        .shape
        .clone()
        .unwrap_or_else(|| DEFAULT_COMPARE_SHAPE.to_string());
    let stats: Vec<String> = form
        .stats
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let extraction = run_extraction(state, &mut form, &shape_name).await?;
    let report = matchup_report(&extraction.table, &stats);
    Ok(CompareResponse::new(&extraction.shape, report))
}
