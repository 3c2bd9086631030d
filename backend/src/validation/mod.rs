//! Row validation for experiment metric CSV records.
//!
//! Turns one raw record (header name → trimmed cell) into a typed
//! [`DataPoint`] or a [`RowError`] naming the row and the offending field.
//!
//! Rules are checked in order and the first failure wins:
//!
//! 1. `experiment_id` present and non-empty
//! 2. `metric_name` present and non-empty
//! 3. `step` numeric, not negative, whole
//! 4. `value` numeric
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use expview::validate_row;
//!
//! let row: HashMap<String, String> = [
//!     ("experiment_id", "run-1"),
//!     ("metric_name", "loss"),
//!     ("step", "3"),
//!     ("value", "0.25"),
//! ]
//! .into_iter()
//! .map(|(k, v)| (k.to_string(), v.to_string()))
//! .collect();
//!
//! let point = validate_row(&row, 1).unwrap();
//! assert_eq!(point.step(), 3);
//! ```

use crate::error::RowError;
use crate::models::DataPoint;
use crate::parser::RawRow;

/// Column names every input file must provide, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 4] = ["experiment_id", "metric_name", "step", "value"];

/// Validate and coerce one row. `row_index` is 1-based.
pub fn validate_row(row: &RawRow, row_index: usize) -> Result<DataPoint, RowError> {
    let experiment_id = required_text(row, "experiment_id", row_index)?;
    let metric_name = required_text(row, "metric_name", row_index)?;
    let step = parse_step(row.get("step").map(String::as_str), row_index)?;
    let value = parse_number(row.get("value").map(String::as_str))
        .ok_or(RowError::InvalidValue { row: row_index })?;

    Ok(DataPoint::new(experiment_id, metric_name, step, value))
}

fn required_text<'a>(
    row: &'a RawRow,
    field: &'static str,
    row_index: usize,
) -> Result<&'a str, RowError> {
    match row.get(field) {
        Some(v) if !v.is_empty() => Ok(v.as_str()),
        _ => Err(RowError::EmptyField {
            row: row_index,
            field,
        }),
    }
}

/// Parse a numeric cell. Empty cells and `NaN` are not numbers.
fn parse_number(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn parse_step(raw: Option<&str>, row_index: usize) -> Result<u64, RowError> {
    let step = parse_number(raw).ok_or(RowError::InvalidStep { row: row_index })?;
    if step < 0.0 {
        return Err(RowError::InvalidStep { row: row_index });
    }
    // u64::MAX as f64 rounds up to 2^64, so the bound is exclusive.
    if !step.is_finite() || step.fract() != 0.0 || step >= u64::MAX as f64 {
        return Err(RowError::FractionalStep { row: row_index });
    }
    Ok(step as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, &str)]) -> RawRow {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full(step: &str, value: &str) -> RawRow {
        row(&[
            ("experiment_id", "e1"),
            ("metric_name", "acc"),
            ("step", step),
            ("value", value),
        ])
    }

    #[test]
    fn test_valid_row() {
        let point = validate_row(&full("2", "0.75"), 1).unwrap();
        assert_eq!(point.experiment_id(), "e1");
        assert_eq!(point.metric_name(), "acc");
        assert_eq!(point.step(), 2);
        assert_eq!(point.value(), 0.75);
    }

    #[test]
    fn test_numeric_notations() {
        assert_eq!(validate_row(&full("1e2", "-3.5e-1"), 1).unwrap().step(), 100);
        assert_eq!(validate_row(&full("4.0", "1"), 1).unwrap().step(), 4);
        assert_eq!(validate_row(&full("-0", "1"), 1).unwrap().step(), 0);
        assert!(validate_row(&full("0", "inf"), 1).unwrap().value().is_infinite());
    }

    #[test]
    fn test_missing_experiment_id() {
        let r = row(&[("metric_name", "acc"), ("step", "0"), ("value", "1")]);
        let err = validate_row(&r, 7).unwrap_err();
        assert_eq!(err.to_string(), "Row 7: experiment_id must be a non-empty string");
    }

    #[test]
    fn test_empty_metric_name() {
        let r = row(&[
            ("experiment_id", "e1"),
            ("metric_name", ""),
            ("step", "0"),
            ("value", "1"),
        ]);
        let err = validate_row(&r, 3).unwrap_err();
        assert_eq!(err.field(), "metric_name");
        assert!(err.to_string().starts_with("Row 3:"));
    }

    #[test]
    fn test_first_failure_wins() {
        // Both experiment_id and step are bad; experiment_id is reported.
        let r = row(&[
            ("experiment_id", ""),
            ("metric_name", "acc"),
            ("step", "-1"),
            ("value", "x"),
        ]);
        assert_eq!(validate_row(&r, 1).unwrap_err().field(), "experiment_id");

        // step and value both bad; step is reported.
        let err = validate_row(&full("abc", "xyz"), 1).unwrap_err();
        assert_eq!(err, RowError::InvalidStep { row: 1 });
    }

    #[test]
    fn test_negative_step() {
        let err = validate_row(&full("-1", "0.5"), 4).unwrap_err();
        assert_eq!(err.to_string(), "Row 4: step must be a non-negative number");
    }

    #[test]
    fn test_non_numeric_step() {
        for bad in ["", "NaN", "three", "1,5"] {
            let err = validate_row(&full(bad, "0.5"), 2).unwrap_err();
            assert_eq!(err, RowError::InvalidStep { row: 2 }, "step {bad:?}");
        }
    }

    #[test]
    fn test_fractional_step() {
        let err = validate_row(&full("1.5", "0.5"), 9).unwrap_err();
        assert_eq!(err.to_string(), "Row 9: step must be a whole number");
        assert_eq!(
            validate_row(&full("inf", "0.5"), 9).unwrap_err(),
            RowError::FractionalStep { row: 9 }
        );
    }

    #[test]
    fn test_invalid_value() {
        for bad in ["", "NaN", "n/a"] {
            let err = validate_row(&full("0", bad), 5).unwrap_err();
            assert_eq!(err.to_string(), "Row 5: value must be a valid number");
        }
    }

    #[test]
    fn test_extra_fields_ignored() {
        let mut r = full("0", "1");
        r.insert("notes".into(), "warmup".into());
        assert!(validate_row(&r, 1).is_ok());
    }
}
