//! Export projector: flatten the current selection back into CSV rows.
//!
//! For each selected experiment, the points whose metric is selected are
//! exported; with no metric selected, every point of the experiment is.
//! Columns are always `experiment_id,metric_name,step,value`.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::{log_success, log_warning};
use crate::error::{ExportError, ExportResult};
use crate::models::{DataPoint, ExperimentCollection, SelectionState};
use crate::validation::REQUIRED_COLUMNS;

/// A serialized export, ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// `experiment_data_<timestamp>.csv`
    pub file_name: String,
    pub row_count: usize,
    /// CSV text including the header row.
    pub contents: String,
}

impl ExportArtifact {
    /// Write the artifact under `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> ExportResult<PathBuf> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(&self.file_name);
        fs::write(&path, &self.contents)?;
        Ok(path)
    }
}

/// Points to export, experiments in selection order, points in step order.
pub fn project_rows<'a>(
    experiments: &'a ExperimentCollection,
    selection: &SelectionState,
) -> Vec<&'a DataPoint> {
    let metrics = &selection.selected_metrics;

    selection
        .selected_experiment_ids
        .iter()
        .filter_map(|id| experiments.get(id))
        .flat_map(|exp| exp.data().iter())
        .filter(|p| metrics.is_empty() || metrics.contains(p.metric_name()))
        .collect()
}

/// Serialize points as CSV with the fixed header.
pub fn rows_to_csv(rows: &[&DataPoint]) -> ExportResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REQUIRED_COLUMNS)?;

    for point in rows {
        let step = point.step().to_string();
        let value = point.value().to_string();
        writer.write_record([
            point.experiment_id(),
            point.metric_name(),
            step.as_str(),
            value.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// `experiment_data_2026-10-14T09-05-03.csv`: UTC, seconds precision,
/// `:` replaced so the name is filesystem-safe.
pub fn export_file_name(at: DateTime<Utc>) -> String {
    let timestamp = at.format("%Y-%m-%dT%H:%M:%S").to_string().replace(':', "-");
    format!("experiment_data_{}.csv", timestamp)
}

/// Build the artifact for the current selection at a given time.
///
/// Returns `Ok(None)` when the projection is empty.
pub fn export_selected_at(
    experiments: &ExperimentCollection,
    selection: &SelectionState,
    at: DateTime<Utc>,
) -> ExportResult<Option<ExportArtifact>> {
    let rows = project_rows(experiments, selection);
    if rows.is_empty() {
        return Ok(None);
    }

    Ok(Some(ExportArtifact {
        file_name: export_file_name(at),
        row_count: rows.len(),
        contents: rows_to_csv(&rows)?,
    }))
}

/// Build the artifact for the current selection, stamped now.
///
/// `None` means there was nothing to export. Serialization errors are
/// logged and also reported as `None`.
pub fn export_selected(
    experiments: &ExperimentCollection,
    selection: &SelectionState,
) -> Option<ExportArtifact> {
    match export_selected_at(experiments, selection, Utc::now()) {
        Ok(Some(artifact)) => {
            log_success(format!(
                "Exported {} rows as {}",
                artifact.row_count, artifact.file_name
            ));
            Some(artifact)
        }
        Ok(None) => {
            log_warning("Nothing to export for the current selection");
            None
        }
        Err(e) => {
            log_warning(format!("Export failed: {}", e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::group_points;
    use chrono::TimeZone;

    fn collection() -> ExperimentCollection {
        group_points(vec![
            DataPoint::new("e1", "acc", 1, 0.7),
            DataPoint::new("e1", "acc", 0, 0.5),
            DataPoint::new("e1", "loss", 0, 1.0),
            DataPoint::new("e2", "acc", 0, 0.25),
            DataPoint::new("e3", "acc", 0, 0.1),
        ])
    }

    fn selection(ids: &[&str], metrics: &[&str]) -> SelectionState {
        SelectionState {
            selected_experiment_ids: ids.iter().map(|s| s.to_string()).collect(),
            selected_metrics: metrics.iter().map(|s| s.to_string()).collect(),
            metric_filter: String::new(),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, 5, 3).unwrap()
    }

    #[test]
    fn test_file_name_is_filesystem_safe() {
        let name = export_file_name(at());
        assert_eq!(name, "experiment_data_2026-10-14T09-05-03.csv");
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_empty_metric_selection_exports_everything() {
        let data = collection();
        let rows = project_rows(&data, &selection(&["e1", "e2"], &[]));
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|p| p.experiment_id() != "e3"));
    }

    #[test]
    fn test_metric_filter_applies_per_experiment() {
        let data = collection();
        let rows = project_rows(&data, &selection(&["e1", "e2"], &["acc"]));
        let keys: Vec<(&str, u64)> = rows.iter().map(|p| (p.experiment_id(), p.step())).collect();
        assert_eq!(keys, vec![("e1", 0), ("e1", 1), ("e2", 0)]);
    }

    #[test]
    fn test_nothing_selected_is_no_output() {
        let data = collection();
        assert_eq!(export_selected_at(&data, &selection(&[], &["acc"]), at()).unwrap(), None);
        assert_eq!(
            export_selected_at(&data, &selection(&["e2"], &["loss"]), at()).unwrap(),
            None
        );
        assert!(export_selected(&data, &SelectionState::default()).is_none());
    }

    #[test]
    fn test_csv_contents() {
        let data = collection();
        let artifact = export_selected_at(&data, &selection(&["e1"], &[]), at())
            .unwrap()
            .unwrap();

        assert_eq!(artifact.row_count, 3);
        assert_eq!(
            artifact.contents,
            "experiment_id,metric_name,step,value\n\
             e1,acc,0,0.5\n\
             e1,loss,0,1\n\
             e1,acc,1,0.7\n"
        );
    }

    #[test]
    fn test_export_reingests_to_same_points() {
        let data = collection();
        let artifact = export_selected_at(&data, &selection(&["e1", "e2"], &[]), at())
            .unwrap()
            .unwrap();

        let result = crate::ingest::ingest_bytes(artifact.contents.as_bytes());
        assert!(result.success);
        assert_eq!(result.experiments.get("e1"), data.get("e1"));
        assert_eq!(result.experiments.get("e2"), data.get("e2"));
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data = collection();
        let artifact = export_selected_at(&data, &selection(&["e2"], &[]), at())
            .unwrap()
            .unwrap();

        let path = artifact.write_to_dir(dir.path().join("out")).unwrap();
        assert!(path.ends_with("experiment_data_2026-10-14T09-05-03.csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), artifact.contents);
    }
}
