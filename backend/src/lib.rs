//! # expview - ML experiment metrics ingestion and selection
//!
//! expview reads long-format metric CSVs (`experiment_id,metric_name,step,value`),
//! validates and groups them into per-experiment time series, and drives the
//! selection, charting and export logic of an experiment viewer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│ Validation  │────▶│   Grouper   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (fail-fast) │     │ (by step)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                     ┌─────────────┐     ┌─────────────┐     ┌──────▼──────┐
//!                     │  CSV export │◀────│  Selection  │◀────│ Collection  │
//!                     └─────────────┘     │  (session)  │     └─────────────┘
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use expview::{ingest_bytes, ExperimentSession};
//!
//! let csv = "experiment_id,metric_name,step,value\nrun-a,loss,0,1.5\nrun-a,loss,1,0.9\n";
//! let mut session = ExperimentSession::new();
//! session.apply_ingest(ingest_bytes(csv.as_bytes()));
//!
//! session.toggle_experiment("run-a");
//! session.toggle_metric("loss");
//! assert_eq!(session.chart_series()[0].points.len(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Domain models (DataPoint, Experiment, SelectionState)
//! - [`parser`] - CSV parsing with auto-detection
//! - [`validation`] - Row validation
//! - [`ingest`] - Ingestion pipeline and grouping
//! - [`selection`] - Selection state and derived views
//! - [`export`] - CSV export of the selection
//! - [`session`] - Selection persistence
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod error;
pub mod models;

// Parsing and ingestion
pub mod parser;
pub mod validation;
pub mod ingest;

// State
pub mod selection;
pub mod export;
pub mod session;

pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvResult, ExportError, IngestError, RowError, ServerError, SessionError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DataPoint, Experiment, ExperimentCollection, ExperimentSummary, MetricSeries,
    SelectionState, SeriesPoint, UploadStatus,
};

// =============================================================================
// Re-exports - Parsing and validation
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, ParsedCsv,
    RawRow,
};
pub use validation::{validate_row, REQUIRED_COLUMNS};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use ingest::{
    group_points, ingest_bytes, ingest_file, ingest_source, CsvInfo, IngestResult, IngestSource,
};

// =============================================================================
// Re-exports - Selection, export, session
// =============================================================================

pub use selection::{ExperimentSession, IngestOutcome};
pub use export::{export_selected, ExportArtifact};
pub use session::{
    load_session, save_session, FileStore, KeyValueStore, MemoryStore, SESSION_KEY,
};
pub use config::Config;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, MetricsResponse, StateResponse, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::{build_router, start_server, AppState};
}
