//! CSV ingestion pipeline: raw source → [`ExperimentCollection`].
//!
//! Steps:
//! 1. Read and decode the source (encoding and delimiter auto-detected)
//! 2. Check the header for every required column
//! 3. Reject files with no data rows
//! 4. Validate every row; the first invalid row aborts the whole file
//! 5. Group by experiment id and stable-sort each experiment by step
//!
//! The public entry points always return an [`IngestResult`]; failures are
//! carried in it as a message, never raised past this module.
//!
//! # Example
//!
//! ```rust
//! use expview::ingest_bytes;
//!
//! let csv = "experiment_id,metric_name,step,value\ne1,acc,1,0.7\ne1,acc,0,0.5\n";
//! let result = ingest_bytes(csv.as_bytes());
//!
//! assert!(result.success);
//! assert_eq!(result.total_rows, Some(2));
//! assert_eq!(result.experiments.get("e1").unwrap().data()[0].step(), 0);
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::grouper::group_points;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success};
use crate::error::{CsvResult, IngestError};
use crate::models::{DataPoint, ExperimentCollection};
use crate::parser::{parse_bytes_auto, ParsedCsv};
use crate::validation::{validate_row, REQUIRED_COLUMNS};

/// Where the CSV comes from.
#[derive(Debug, Clone)]
pub enum IngestSource {
    /// A file on disk, read asynchronously.
    Path(PathBuf),
    /// Already-received bytes (HTTP upload), with an optional display name.
    Bytes { name: Option<String>, data: Vec<u8> },
}

impl IngestSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        IngestSource::Path(path.into())
    }

    pub fn bytes(name: Option<String>, data: Vec<u8>) -> Self {
        IngestSource::Bytes { name, data }
    }

    /// Human-readable name for logs.
    pub fn display_name(&self) -> String {
        match self {
            IngestSource::Path(p) => p.display().to_string(),
            IngestSource::Bytes { name, data } => name
                .clone()
                .unwrap_or_else(|| format!("upload ({} bytes)", data.len())),
        }
    }
}

/// Detected properties of the parsed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParsedCsv> for CsvInfo {
    fn from(parsed: &ParsedCsv) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.rows.len(),
        }
    }
}

/// Structured outcome of one ingestion.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub success: bool,
    /// Empty on failure.
    pub experiments: ExperimentCollection,
    pub error: Option<String>,
    /// Total data points, on success.
    pub total_rows: Option<usize>,
    /// Present whenever the source could be parsed.
    pub csv_info: Option<CsvInfo>,
}

impl IngestResult {
    fn succeeded(experiments: ExperimentCollection, csv_info: CsvInfo) -> Self {
        let total_rows = experiments.total_data_points();
        Self {
            success: true,
            experiments,
            error: None,
            total_rows: Some(total_rows),
            csv_info: Some(csv_info),
        }
    }

    fn failed(error: &IngestError, csv_info: Option<CsvInfo>) -> Self {
        Self {
            success: false,
            experiments: ExperimentCollection::new(),
            error: Some(error.to_string()),
            total_rows: None,
            csv_info,
        }
    }
}

/// Ingest from any source.
pub async fn ingest_source(source: IngestSource) -> IngestResult {
    log_info(format!("📖 Reading {}...", source.display_name()));
    match source {
        IngestSource::Path(path) => ingest_file(&path).await,
        IngestSource::Bytes { data, .. } => ingest_bytes(&data),
    }
}

/// Ingest a CSV file. The read is the only suspending step.
pub async fn ingest_file(path: &Path) -> IngestResult {
    match tokio::fs::read(path).await {
        Ok(bytes) => ingest_bytes(&bytes),
        Err(e) => {
            let error = IngestError::Read(format!("cannot read '{}': {}", path.display(), e));
            log_error(error.to_string());
            IngestResult::failed(&error, None)
        }
    }
}

/// Ingest CSV bytes already in memory.
pub fn ingest_bytes(bytes: &[u8]) -> IngestResult {
    let parsed = match parse_bytes_auto(bytes) {
        Ok(parsed) => parsed,
        Err(error) => {
            log_error(error.to_string());
            return IngestResult::failed(&error, None);
        }
    };

    let csv_info = CsvInfo::from(&parsed);
    log_success(format!("Detected encoding: {}", csv_info.encoding));
    log_success(format!(
        "Detected separator: '{}'",
        format_delimiter(csv_info.delimiter)
    ));
    log_success(format!("Read {} rows", csv_info.row_count));

    match build_collection(parsed) {
        Ok(experiments) => {
            log_success(format!(
                "{} experiments, {} data points",
                experiments.len(),
                experiments.total_data_points()
            ));
            IngestResult::succeeded(experiments, csv_info)
        }
        Err(error) => {
            log_error(error.to_string());
            IngestResult::failed(&error, Some(csv_info))
        }
    }
}

/// Header check, empty check, fail-fast validation and grouping.
pub fn build_collection(parsed: ParsedCsv) -> CsvResult<ExperimentCollection> {
    check_headers(&parsed.headers)?;

    if parsed.rows.is_empty() {
        return Err(IngestError::EmptyInput);
    }

    log_info("✔️  Validating rows...");
    let points = parsed
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| validate_row(row, i + 1))
        .collect::<Result<Vec<DataPoint>, _>>()?;
    log_info_indent(format!("{} rows valid", points.len()), 1);

    log_info("📦 Grouping by experiment...");
    Ok(group_points(points))
}

/// Every required column must appear in the header.
pub fn check_headers(headers: &[String]) -> CsvResult<()> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::MissingColumns(missing))
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "experiment_id,metric_name,step,value\n";

    #[test]
    fn test_scenario_single_experiment() {
        let csv = format!("{HEADER}e1,acc,0,0.5\ne1,acc,1,0.7\ne1,loss,0,1.2\n");
        let result = ingest_bytes(csv.as_bytes());

        assert!(result.success);
        assert_eq!(result.error, None);
        assert_eq!(result.total_rows, Some(3));

        let e1 = result.experiments.get("e1").unwrap();
        let order: Vec<(&str, u64)> = e1.data().iter().map(|p| (p.metric_name(), p.step())).collect();
        assert_eq!(order, vec![("acc", 0), ("loss", 0), ("acc", 1)]);
    }

    #[test]
    fn test_missing_value_column() {
        let csv = "experiment_id,metric_name,step\ne1,acc,0\n";
        let result = ingest_bytes(csv.as_bytes());

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Missing required columns: value"));
        assert!(result.experiments.is_empty());
    }

    #[test]
    fn test_missing_columns_reported_before_rows() {
        // The data row is invalid too, but the header error wins.
        let csv = "experiment_id,note\n,abc\n";
        let result = ingest_bytes(csv.as_bytes());
        assert_eq!(
            result.error.as_deref(),
            Some("Missing required columns: metric_name, step, value")
        );
    }

    #[test]
    fn test_empty_file() {
        let result = ingest_bytes(b"");
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Missing required columns: experiment_id, metric_name, step, value")
        );
    }

    #[test]
    fn test_header_only() {
        let result = ingest_bytes(HEADER.as_bytes());
        assert_eq!(
            result.error.as_deref(),
            Some("CSV file is empty or contains no valid data")
        );
    }

    #[test]
    fn test_negative_step_aborts_whole_file() {
        let csv = format!("{HEADER}e1,acc,0,0.5\ne1,acc,1,0.7\ne2,acc,-1,0.1\ne3,acc,0,0.2\n");
        let result = ingest_bytes(csv.as_bytes());

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Row 3"), "{error}");
        assert!(error.contains("non-negative number"), "{error}");
        assert!(result.experiments.is_empty());
        assert_eq!(result.total_rows, None);
    }

    #[test]
    fn test_first_invalid_row_reported() {
        let csv = format!("{HEADER}e1,acc,0,oops\n,acc,0,1\n");
        let result = ingest_bytes(csv.as_bytes());
        assert_eq!(result.error.as_deref(), Some("Row 1: value must be a valid number"));
    }

    #[test]
    fn test_extra_columns_and_whitespace() {
        let csv = " step , value ,notes, experiment_id ,metric_name\n 3 , 0.9 , late , run-a , acc \n";
        let result = ingest_bytes(csv.as_bytes());

        assert!(result.success, "{:?}", result.error);
        let point = &result.experiments.get("run-a").unwrap().data()[0];
        assert_eq!(point.metric_name(), "acc");
        assert_eq!(point.step(), 3);
        assert_eq!(point.value(), 0.9);
    }

    #[test]
    fn test_semicolon_file() {
        let csv = "experiment_id;metric_name;step;value\ne1;acc;0;0.5\n";
        let result = ingest_bytes(csv.as_bytes());
        assert!(result.success);
        assert_eq!(result.csv_info.unwrap().delimiter, ';');
    }

    #[test]
    fn test_stable_order_for_equal_steps() {
        let csv = format!("{HEADER}e1,c,1,0\ne1,a,0,0\ne1,b,1,0\ne1,d,0,0\n");
        let result = ingest_bytes(csv.as_bytes());
        let names: Vec<&str> = result
            .experiments
            .get("e1")
            .unwrap()
            .data()
            .iter()
            .map(DataPoint::metric_name)
            .collect();
        assert_eq!(names, vec!["a", "d", "c", "b"]);
    }

    #[tokio::test]
    async fn test_ingest_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{HEADER}e1,acc,0,0.5\ne2,loss,4,2.0\n").unwrap();

        let result = ingest_source(IngestSource::path(file.path())).await;
        assert!(result.success);
        assert_eq!(result.experiments.len(), 2);
        assert_eq!(result.total_rows, Some(2));
    }

    #[tokio::test]
    async fn test_unreadable_file() {
        let result = ingest_file(Path::new("/nonexistent/dir/metrics.csv")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Failed to read CSV file"));
    }

    #[test]
    fn test_invalid_utf8_is_read_error() {
        // The BOM pins detection to UTF-8; 0xFF can never appear in UTF-8.
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(HEADER.as_bytes());
        bytes.extend_from_slice(b"e1,acc,0,1\ne1,");
        bytes.push(0xFF);
        bytes.extend_from_slice(b",1,2\n");

        let result = ingest_bytes(&bytes);
        assert!(!result.success);
        assert!(result.csv_info.is_none());
        let error = result.error.unwrap();
        assert!(error.starts_with("Failed to read CSV file"), "{error}");
    }

    #[test]
    fn test_blank_cell_row_is_rejected() {
        let csv = format!("{HEADER}e1,acc,0,1\n,,,\ne1,acc,1,2\n");
        let result = ingest_bytes(csv.as_bytes());

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Row 2: experiment_id must be a non-empty string")
        );
        assert!(result.experiments.is_empty());
    }
}
