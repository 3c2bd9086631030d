//! Domain models for the experiment metrics pipeline.
//!
//! This module contains the core data structures used throughout the crate:
//!
//! - [`DataPoint`] - One validated measurement (experiment, metric, step, value)
//! - [`Experiment`] - All points sharing one experiment id, sorted by step
//! - [`ExperimentCollection`] - The result of one successful ingestion
//! - [`MetricSeries`] - Chart-ready (step, value) series, derived on read
//! - [`SelectionState`] - User-controlled experiment/metric selection
//! - [`UploadStatus`] - Observable ingestion status

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// Data Point
// =============================================================================

/// A single validated measurement.
///
/// Fields are private: a point never changes once the row validator has
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    experiment_id: String,
    metric_name: String,
    step: u64,
    value: f64,
}

impl DataPoint {
    pub fn new(
        experiment_id: impl Into<String>,
        metric_name: impl Into<String>,
        step: u64,
        value: f64,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            metric_name: metric_name.into(),
            step,
            value,
        }
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

// =============================================================================
// Experiment
// =============================================================================

/// All data points of one experiment.
///
/// Invariants (established by [`crate::ingest::group_points`]):
/// - every point's `experiment_id` equals `id`
/// - `metrics` is exactly the set of metric names found in `data`
/// - `data` is sorted by step, equal steps keep input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Experiment {
    id: String,
    metrics: BTreeSet<String>,
    data: Vec<DataPoint>,
}

impl Experiment {
    /// Start an experiment with no points. Only the grouper builds these.
    pub(crate) fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metrics: BTreeSet::new(),
            data: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, point: DataPoint) {
        if !self.metrics.contains(point.metric_name()) {
            self.metrics.insert(point.metric_name().to_string());
        }
        self.data.push(point);
    }

    /// Stable sort: equal steps keep their relative input order.
    pub(crate) fn sort_by_step(&mut self) {
        self.data.sort_by_key(DataPoint::step);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metrics(&self) -> &BTreeSet<String> {
        &self.metrics
    }

    pub fn data(&self) -> &[DataPoint] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Points of one metric, in step order.
    pub fn points_for<'a>(&'a self, metric_name: &'a str) -> impl Iterator<Item = &'a DataPoint> + 'a {
        self.data.iter().filter(move |p| p.metric_name() == metric_name)
    }
}

// =============================================================================
// Experiment Collection
// =============================================================================

/// Mapping from experiment id to [`Experiment`].
///
/// Built once per ingestion and replaced wholesale, never edited in place.
/// Iteration follows id order; callers should not depend on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExperimentCollection {
    experiments: BTreeMap<String, Experiment>,
}

impl ExperimentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(experiments: BTreeMap<String, Experiment>) -> Self {
        Self { experiments }
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Experiment> {
        self.experiments.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.experiments.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.values()
    }

    /// Sum of data points over every experiment.
    pub fn total_data_points(&self) -> usize {
        self.experiments.values().map(Experiment::len).sum()
    }
}

// =============================================================================
// Derived series
// =============================================================================

/// One (step, value) pair of a [`MetricSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub step: u64,
    pub value: f64,
}

/// Chart-ready series for one experiment/metric pair.
///
/// Never stored; regenerated from the collection and the selection on
/// every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub experiment_id: String,
    pub metric_name: String,
    pub points: Vec<SeriesPoint>,
}

/// Listing entry for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSummary {
    pub id: String,
    pub metrics: Vec<String>,
    pub data_points: usize,
    pub selected: bool,
}

// =============================================================================
// Selection & status
// =============================================================================

/// User-controlled selection.
///
/// The serialized form is also the persisted session blob:
/// `{ "selectedExperimentIds": [..], "selectedMetrics": [..], "metricFilter": ".." }`.
/// Missing fields deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionState {
    pub selected_experiment_ids: BTreeSet<String>,
    pub selected_metrics: BTreeSet<String>,
    pub metric_filter: String,
}

/// Ingestion status record `{loading, error, success}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub loading: bool,
    pub error: Option<String>,
    pub success: bool,
}

impl UploadStatus {
    pub fn loading() -> Self {
        Self {
            loading: true,
            error: None,
            success: false,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            loading: false,
            error: None,
            success: true,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            loading: false,
            error: Some(error.into()),
            success: false,
        }
    }
}
