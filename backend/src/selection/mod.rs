//! Selection state model.
//!
//! [`ExperimentSession`] owns the current [`ExperimentCollection`], the
//! user's [`SelectionState`] and the [`UploadStatus`]. It is an explicit
//! value: the CLI creates one per run and the HTTP server one per process.
//!
//! Every derived view (`all_metrics`, `chart_series`, ...) is computed from
//! the authoritative state on each call, so a view can never be stale.
//! Mutations take `&mut self` and replace whole fields, so readers only ever
//! see a committed state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::export::{export_selected, ExportArtifact};
use crate::ingest::{ingest_source, IngestResult, IngestSource};
use crate::models::{
    Experiment, ExperimentCollection, ExperimentSummary, MetricSeries, SelectionState,
    SeriesPoint, UploadStatus,
};

/// Outcome reported to the caller of [`ExperimentSession::ingest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiments_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One viewer session: data, selection and ingestion status.
#[derive(Debug, Clone, Default)]
pub struct ExperimentSession {
    experiments: ExperimentCollection,
    selection: SelectionState,
    status: UploadStatus,
}

impl ExperimentSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session over an already-built collection, nothing selected.
    pub fn with_experiments(experiments: ExperimentCollection) -> Self {
        Self {
            experiments,
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // State accessors
    // -------------------------------------------------------------------------

    pub fn experiments(&self) -> &ExperimentCollection {
        &self.experiments
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn upload_status(&self) -> &UploadStatus {
        &self.status
    }

    // -------------------------------------------------------------------------
    // Ingestion
    // -------------------------------------------------------------------------

    /// Run the ingestion pipeline and commit its result.
    pub async fn ingest(&mut self, source: IngestSource) -> IngestOutcome {
        self.begin_ingest();
        let result = ingest_source(source).await;
        self.apply_ingest(result)
    }

    /// Mark an ingestion as in flight. Data and selections are untouched.
    pub fn begin_ingest(&mut self) {
        self.status = UploadStatus::loading();
    }

    /// Commit a pipeline result.
    ///
    /// On success the collection is replaced and all selections are
    /// cleared. On failure only the status changes.
    pub fn apply_ingest(&mut self, result: IngestResult) -> IngestOutcome {
        if result.success {
            let total_rows = result.total_rows.unwrap_or(0);
            self.experiments = result.experiments;
            self.status = UploadStatus::succeeded();
            self.clear_selections();
            log_success(format!(
                "Loaded {} experiments ({} data points)",
                self.experiments.len(),
                total_rows
            ));

            IngestOutcome {
                success: true,
                experiments_count: Some(self.experiments.len()),
                total_rows: Some(total_rows),
                error: None,
            }
        } else {
            let error = result
                .error
                .unwrap_or_else(|| "Unknown error occurred".to_string());
            self.status = UploadStatus::failed(error.clone());

            IngestOutcome {
                success: false,
                experiments_count: None,
                total_rows: None,
                error: Some(error),
            }
        }
    }

    /// Drop all data, selections and status.
    pub fn clear_all(&mut self) {
        self.experiments = ExperimentCollection::new();
        self.clear_selections();
        self.status = UploadStatus::default();
        log_info("Cleared all experiment data");
    }

    // -------------------------------------------------------------------------
    // Experiment selection
    // -------------------------------------------------------------------------

    /// Flip one experiment in or out of the selection.
    ///
    /// The metric selection is always cleared. Ids not in the collection
    /// can be removed but never added.
    pub fn toggle_experiment(&mut self, id: &str) {
        let mut ids = self.selection.selected_experiment_ids.clone();
        if !ids.remove(id) {
            if self.experiments.contains(id) {
                ids.insert(id.to_string());
            } else {
                log_warning(format!("Ignoring unknown experiment '{}'", id));
            }
        }
        self.selection.selected_experiment_ids = ids;
        self.selection.selected_metrics = BTreeSet::new();
    }

    pub fn select_all_experiments(&mut self) {
        self.selection.selected_experiment_ids =
            self.experiments.ids().map(str::to_string).collect();
        self.selection.selected_metrics = BTreeSet::new();
    }

    pub fn clear_experiment_selection(&mut self) {
        self.selection.selected_experiment_ids = BTreeSet::new();
        self.selection.selected_metrics = BTreeSet::new();
    }

    // -------------------------------------------------------------------------
    // Metric selection
    // -------------------------------------------------------------------------

    /// Flip one metric. Names need not exist in the selected experiments.
    pub fn toggle_metric(&mut self, name: &str) {
        let mut metrics = self.selection.selected_metrics.clone();
        if !metrics.remove(name) {
            metrics.insert(name.to_string());
        }
        self.selection.selected_metrics = metrics;
    }

    pub fn select_all_metrics(&mut self) {
        self.selection.selected_metrics =
            self.available_metrics_for_selection().into_iter().collect();
    }

    pub fn clear_metric_selection(&mut self) {
        self.selection.selected_metrics = BTreeSet::new();
    }

    /// Stored verbatim, no trimming.
    pub fn set_metric_filter(&mut self, filter: impl Into<String>) {
        self.selection.metric_filter = filter.into();
    }

    pub fn clear_selections(&mut self) {
        self.selection = SelectionState::default();
    }

    /// Replace the selection with a restored one.
    ///
    /// Experiment ids unknown to the current collection are dropped; metric
    /// names and the filter are kept as-is.
    pub fn restore_selection(&mut self, restored: SelectionState) {
        let SelectionState {
            selected_experiment_ids,
            selected_metrics,
            metric_filter,
        } = restored;

        let known: BTreeSet<String> = selected_experiment_ids
            .into_iter()
            .filter(|id| self.experiments.contains(id))
            .collect();

        self.selection = SelectionState {
            selected_experiment_ids: known,
            selected_metrics,
            metric_filter,
        };
    }

    // -------------------------------------------------------------------------
    // Derived views
    // -------------------------------------------------------------------------

    /// Every metric name across all experiments, sorted.
    pub fn all_metrics(&self) -> Vec<String> {
        let metrics: BTreeSet<&String> = self
            .experiments
            .iter()
            .flat_map(|exp| exp.metrics().iter())
            .collect();
        metrics.into_iter().cloned().collect()
    }

    /// Sorted union of the metrics of the selected experiments.
    pub fn available_metrics_for_selection(&self) -> Vec<String> {
        let metrics: BTreeSet<&String> = self
            .selected_experiments()
            .into_iter()
            .flat_map(|exp| exp.metrics().iter())
            .collect();
        metrics.into_iter().cloned().collect()
    }

    /// Available metrics containing the filter, case-insensitively.
    pub fn filtered_metrics(&self) -> Vec<String> {
        let available = self.available_metrics_for_selection();
        if self.selection.metric_filter.is_empty() {
            return available;
        }

        let needle = self.selection.metric_filter.to_lowercase();
        available
            .into_iter()
            .filter(|metric| metric.to_lowercase().contains(&needle))
            .collect()
    }

    /// One series per selected (experiment, metric) pair that has data.
    pub fn chart_series(&self) -> Vec<MetricSeries> {
        if self.selection.selected_experiment_ids.is_empty()
            || self.selection.selected_metrics.is_empty()
        {
            return Vec::new();
        }

        let mut series = Vec::new();
        for experiment in self.selected_experiments() {
            for metric_name in &self.selection.selected_metrics {
                // Experiment data is already in step order.
                let points: Vec<SeriesPoint> = experiment
                    .points_for(metric_name)
                    .map(|p| SeriesPoint {
                        step: p.step(),
                        value: p.value(),
                    })
                    .collect();

                if !points.is_empty() {
                    series.push(MetricSeries {
                        experiment_id: experiment.id().to_string(),
                        metric_name: metric_name.clone(),
                        points,
                    });
                }
            }
        }
        series
    }

    /// Data points across all experiments, regardless of selection.
    pub fn total_data_points(&self) -> usize {
        self.experiments.total_data_points()
    }

    pub fn selected_experiments(&self) -> Vec<&Experiment> {
        self.selection
            .selected_experiment_ids
            .iter()
            .filter_map(|id| self.experiments.get(id))
            .collect()
    }

    /// Listing of every experiment with its selection flag.
    pub fn experiment_summaries(&self) -> Vec<ExperimentSummary> {
        self.experiments
            .iter()
            .map(|exp| ExperimentSummary {
                id: exp.id().to_string(),
                metrics: exp.metrics().iter().cloned().collect(),
                data_points: exp.len(),
                selected: self.selection.selected_experiment_ids.contains(exp.id()),
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// See [`export_selected`]. `None` when nothing would be written.
    pub fn export_selected_data(&self) -> Option<ExportArtifact> {
        export_selected(&self.experiments, &self.selection)
    }
}
