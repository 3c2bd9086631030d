//! REST API types for frontend integration.
//!
//! Every body is camelCase JSON.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::ingest::CsvInfo;
use crate::models::{SelectionState, UploadStatus};
use crate::selection::{ExperimentSession, IngestOutcome};

/// Response sent after a CSV upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready" or "error"
    pub status: String,

    #[serde(flatten)]
    pub outcome: IngestOutcome,

    /// Present whenever the file could be parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_info: Option<CsvInfo>,
}

impl UploadResponse {
    pub fn new(outcome: IngestOutcome, csv_info: Option<CsvInfo>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: if outcome.success { "ready" } else { "error" }.to_string(),
            outcome,
            csv_info,
        }
    }
}

/// `GET /api/state`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub selection: SelectionState,
    pub status: UploadStatus,
    pub experiments_count: usize,
    pub total_data_points: usize,
}

impl From<&ExperimentSession> for StateResponse {
    fn from(session: &ExperimentSession) -> Self {
        Self {
            selection: session.selection().clone(),
            status: session.upload_status().clone(),
            experiments_count: session.experiments().len(),
            total_data_points: session.total_data_points(),
        }
    }
}

/// `GET /api/metrics`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub all: Vec<String>,
    pub available: Vec<String>,
    pub filtered: Vec<String>,
    pub selected: Vec<String>,
    pub filter: String,
}

impl From<&ExperimentSession> for MetricsResponse {
    fn from(session: &ExperimentSession) -> Self {
        Self {
            all: session.all_metrics(),
            available: session.available_metrics_for_selection(),
            filtered: session.filtered_metrics(),
            selected: session.selection().selected_metrics.iter().cloned().collect(),
            filter: session.selection().metric_filter.clone(),
        }
    }
}

/// `PUT /api/metrics/filter` body
#[derive(Debug, Clone, Deserialize)]
pub struct FilterRequest {
    pub filter: String,
}

/// `POST /api/session/save` and `/load`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Whether a selection was written (save) or applied (load)
    pub applied: bool,
    pub selection: SelectionState,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "success": false,
        "error": error,
    })
}
