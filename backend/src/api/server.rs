//! HTTP Server for the expview API.
//!
//! One [`ExperimentSession`] lives behind a mutex for the lifetime of the
//! process. Every selection operation and derived view is a route.
//!
//! # API Endpoints
//!
//! | Method | Path                              | Description                     |
//! |--------|-----------------------------------|---------------------------------|
//! | GET    | `/health`                         | Health check                    |
//! | GET    | `/api/logs`                       | SSE stream for real-time logs   |
//! | POST   | `/api/upload`                     | Upload a metrics CSV (`file`)   |
//! | GET    | `/api/state`                      | Selection, status and totals    |
//! | DELETE | `/api/data`                       | Drop all data and selections    |
//! | GET    | `/api/experiments`                | Experiment summaries            |
//! | POST   | `/api/experiments/{id}/toggle`    | Toggle one experiment           |
//! | POST   | `/api/experiments/select-all`     | Select every experiment         |
//! | POST   | `/api/experiments/clear`          | Clear experiment selection      |
//! | GET    | `/api/metrics`                    | All / available / filtered      |
//! | POST   | `/api/metrics/{name}/toggle`      | Toggle one metric               |
//! | POST   | `/api/metrics/select-all`         | Select every available metric   |
//! | POST   | `/api/metrics/clear`              | Clear metric selection          |
//! | PUT    | `/api/metrics/filter`             | Set the metric filter           |
//! | POST   | `/api/selections/clear`           | Clear every selection           |
//! | GET    | `/api/chart`                      | Chart series for the selection  |
//! | GET    | `/api/export`                     | CSV download (204 if empty)     |
//! | POST   | `/api/session/save`               | Persist the selection           |
//! | POST   | `/api/session/load`               | Restore the persisted selection |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{delete, get, post, put},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{
    error_response, FilterRequest, MetricsResponse, SessionResponse, StateResponse,
    UploadResponse,
};
use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::ingest::{ingest_bytes, IngestResult};
use crate::models::{ExperimentCollection, ExperimentSummary, MetricSeries};
use crate::selection::ExperimentSession;
use crate::session::{load_session, save_session, FileStore};

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<ExperimentSession>>,
    pub store: Arc<Mutex<FileStore>>,
}

impl AppState {
    pub fn new(store: FileStore) -> Self {
        Self {
            session: Arc::new(Mutex::new(ExperimentSession::new())),
            store: Arc::new(Mutex::new(store)),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::IngestInProgress => StatusCode::CONFLICT,
            ServerError::Session(_) | ServerError::Export(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            log_error(self.to_string());
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the router over a given state.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/logs", get(sse_logs))
        .route("/api/upload", post(upload_csv))
        .route("/api/state", get(get_state))
        .route("/api/data", delete(clear_data))
        .route("/api/experiments", get(list_experiments))
        .route("/api/experiments/select-all", post(select_all_experiments))
        .route("/api/experiments/clear", post(clear_experiments))
        .route("/api/experiments/{id}/toggle", post(toggle_experiment))
        .route("/api/metrics", get(list_metrics))
        .route("/api/metrics/select-all", post(select_all_metrics))
        .route("/api/metrics/clear", post(clear_metrics))
        .route("/api/metrics/filter", put(set_filter))
        .route("/api/metrics/{name}/toggle", post(toggle_metric))
        .route("/api/selections/clear", post(clear_selections))
        .route("/api/chart", get(chart))
        .route("/api/export", get(export_csv))
        .route("/api/session/save", post(session_save))
        .route("/api/session/load", post(session_load))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(FileStore::with_dir(&config.session_dir));
    let app = build_router(state, config.max_upload_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 expview server running on http://localhost:{}", config.port);
    println!("   POST /api/upload - Upload metrics CSV");
    println!("   GET  /api/chart  - Chart series");
    println!("   GET  /api/export - CSV export");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();
    println!("💾 Session store: {}", config.session_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "expview",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "chart": "GET /api/chart",
            "export": "GET /api/export",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the missed entries.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Upload
// =============================================================================

/// Upload CSV endpoint
async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

    println!("\n{}", "=".repeat(70));
    println!(
        "📄 NEW UPLOAD: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    );
    println!("{}\n", "=".repeat(70));

    run_ingest(&state, bytes).await.map(Json)
}

/// Two-phase ingestion: mark loading, run the pipeline without holding
/// the session lock, then commit.
///
/// Everything after `begin_ingest` runs in a spawned task, so dropping the
/// request future (client disconnect) cannot leave the session loading.
async fn run_ingest(state: &AppState, bytes: Vec<u8>) -> ServerResult<UploadResponse> {
    {
        let mut session = state.session.lock().await;
        if session.upload_status().loading {
            return Err(ServerError::IngestInProgress);
        }
        session.begin_ingest();
    }

    let task = tokio::spawn(ingest_and_commit(state.session.clone(), bytes));
    task.await
        .map_err(|e| ServerError::Internal(format!("ingestion task failed: {}", e)))?
}

async fn ingest_and_commit(
    session: Arc<Mutex<ExperimentSession>>,
    bytes: Vec<u8>,
) -> ServerResult<UploadResponse> {
    match tokio::task::spawn_blocking(move || ingest_bytes(&bytes)).await {
        Ok(result) => {
            let csv_info = result.csv_info.clone();
            let outcome = session.lock().await.apply_ingest(result);
            Ok(UploadResponse::new(outcome, csv_info))
        }
        Err(e) => {
            let error = ServerError::Internal(format!("ingestion task failed: {}", e));
            session.lock().await.apply_ingest(IngestResult {
                success: false,
                experiments: ExperimentCollection::new(),
                error: Some(error.to_string()),
                total_rows: None,
                csv_info: None,
            });
            Err(error)
        }
    }
}

// =============================================================================
// State and experiments
// =============================================================================

async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    let session = state.session.lock().await;
    Json(StateResponse::from(&*session))
}

async fn clear_data(State(state): State<AppState>) -> ServerResult<Json<StateResponse>> {
    let mut session = state.session.lock().await;
    if session.upload_status().loading {
        return Err(ServerError::IngestInProgress);
    }
    session.clear_all();
    Ok(Json(StateResponse::from(&*session)))
}

async fn list_experiments(State(state): State<AppState>) -> Json<Vec<ExperimentSummary>> {
    Json(state.session.lock().await.experiment_summaries())
}

async fn toggle_experiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<ExperimentSummary>> {
    let mut session = state.session.lock().await;
    session.toggle_experiment(&id);
    Json(session.experiment_summaries())
}

async fn select_all_experiments(State(state): State<AppState>) -> Json<Vec<ExperimentSummary>> {
    let mut session = state.session.lock().await;
    session.select_all_experiments();
    Json(session.experiment_summaries())
}

async fn clear_experiments(State(state): State<AppState>) -> Json<Vec<ExperimentSummary>> {
    let mut session = state.session.lock().await;
    session.clear_experiment_selection();
    Json(session.experiment_summaries())
}

// =============================================================================
// Metrics
// =============================================================================

async fn list_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse::from(&*state.session.lock().await))
}

async fn toggle_metric(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<MetricsResponse> {
    let mut session = state.session.lock().await;
    session.toggle_metric(&name);
    Json(MetricsResponse::from(&*session))
}

async fn select_all_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut session = state.session.lock().await;
    session.select_all_metrics();
    Json(MetricsResponse::from(&*session))
}

async fn clear_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut session = state.session.lock().await;
    session.clear_metric_selection();
    Json(MetricsResponse::from(&*session))
}

async fn set_filter(
    State(state): State<AppState>,
    Json(body): Json<FilterRequest>,
) -> Json<MetricsResponse> {
    let mut session = state.session.lock().await;
    session.set_metric_filter(body.filter);
    Json(MetricsResponse::from(&*session))
}

async fn clear_selections(State(state): State<AppState>) -> Json<StateResponse> {
    let mut session = state.session.lock().await;
    session.clear_selections();
    Json(StateResponse::from(&*session))
}

// =============================================================================
// Chart and export
// =============================================================================

async fn chart(State(state): State<AppState>) -> Json<Vec<MetricSeries>> {
    Json(state.session.lock().await.chart_series())
}

async fn export_csv(State(state): State<AppState>) -> Response {
    let artifact = state.session.lock().await.export_selected_data();

    match artifact {
        Some(artifact) => {
            let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.contents,
            )
                .into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

// =============================================================================
// Session persistence
// =============================================================================

async fn session_save(State(state): State<AppState>) -> ServerResult<Json<SessionResponse>> {
    let session = state.session.lock().await;
    let mut store = state.store.lock().await;
    save_session(&session, &mut *store)?;

    Ok(Json(SessionResponse {
        applied: true,
        selection: session.selection().clone(),
    }))
}

async fn session_load(State(state): State<AppState>) -> Json<SessionResponse> {
    let mut session = state.session.lock().await;
    let store = state.store.lock().await;
    let applied = load_session(&mut session, &*store);
    if !applied {
        log_info("No stored session applied, selection cleared");
    }

    Json(SessionResponse {
        applied,
        selection: session.selection().clone(),
    })
}
