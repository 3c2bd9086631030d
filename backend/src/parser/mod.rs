//! Delimited-text reader with encoding and delimiter auto-detection.
//!
//! Converts raw bytes into a header list plus one [`RawRow`] per data line.
//! Header names and cell values are trimmed. No experiment-specific logic
//! lives here; see [`crate::validation`] and [`crate::ingest`].

use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;

use crate::error::{CsvResult, IngestError};

/// One data row as an unordered field bag: header name → trimmed cell.
///
/// Cells missing from short rows are absent from the map.
pub type RawRow = HashMap<String, String>;

/// Delimiter used when the header line gives no better signal.
pub const DEFAULT_DELIMITER: char = ',';

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    /// Trimmed column headers, in file order
    pub headers: Vec<String>,
    /// Data rows in file order, empty lines skipped
    pub rows: Vec<RawRow>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding.
///
/// UTF-8 is decoded strictly: invalid sequences are a read error rather
/// than being replaced.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| IngestError::Read(format!("invalid UTF-8 content: {}", e)))?,
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        label => {
            let encoding = encoding_rs::Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                IngestError::Read(format!("unsupported encoding '{}'", label))
            })?;
            let (decoded, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                return Err(IngestError::Read(format!(
                    "content is not valid {}",
                    encoding.name()
                )));
            }
            decoded.into_owned()
        }
    };

    if text.starts_with('\u{feff}') {
        Ok(text['\u{feff}'.len_utf8()..].to_string())
    } else {
        Ok(text)
    }
}

/// Detect the delimiter by counting occurrences in the header line
pub fn detect_delimiter(content: &str) -> char {
    let header_line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = DEFAULT_DELIMITER;
    let mut best_count = 0;

    for &sep in &separators {
        let count = header_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded text with an explicit delimiter.
///
/// Rows may be shorter or longer than the header: missing cells are left
/// out of the row, extra cells are ignored. Only truly empty lines are
/// skipped; a line of blank cells is still a row.
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<(Vec<String>, Vec<RawRow>)> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| IngestError::Parse(format!("unsupported delimiter '{}'", delimiter)))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    // First occurrence of a duplicated header wins.
    let mut columns: Vec<(usize, &str)> = Vec::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        if !name.is_empty() && !columns.iter().any(|(_, n)| *n == name.as_str()) {
            columns.push((idx, name.as_str()));
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;

        let row: RawRow = columns
            .iter()
            .filter_map(|(idx, name)| {
                record
                    .get(*idx)
                    .map(|cell| (name.to_string(), cell.to_string()))
            })
            .collect();
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParsedCsv> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let (headers, rows) = parse_str(&content, delimiter)?;

    Ok(ParsedCsv {
        headers,
        rows,
        encoding,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let csv = "experiment_id,metric_name,step,value\ne1,acc,0,0.5\ne1,acc,1,0.7";
        let (headers, rows) = parse_str(csv, ',').unwrap();

        assert_eq!(headers, vec!["experiment_id", "metric_name", "step", "value"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["step"], "1");
        assert_eq!(rows[1]["value"], "0.7");
    }

    #[test]
    fn test_headers_and_cells_trimmed() {
        let csv = " experiment_id , metric_name ,step, value \n  e1 ,  loss , 3 , 0.1 ";
        let (headers, rows) = parse_str(csv, ',').unwrap();

        assert_eq!(headers[0], "experiment_id");
        assert_eq!(headers[3], "value");
        assert_eq!(rows[0]["experiment_id"], "e1");
        assert_eq!(rows[0]["metric_name"], "loss");
        assert_eq!(rows[0]["value"], "0.1");
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,note\n\"run, one\",\"hello\"";
        let (_, rows) = parse_str(csv, ',').unwrap();
        assert_eq!(rows[0]["name"], "run, one");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "a,b\n1,2\n\n3,4\n";
        let (_, rows) = parse_str(csv, ',').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_blank_cells_still_a_row() {
        let csv = "a,b\n1,2\n , \n,\n";
        let (_, rows) = parse_str(csv, ',').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["a"], "");
        assert_eq!(rows[2]["b"], "");
    }

    #[test]
    fn test_short_rows_leave_fields_absent() {
        let csv = "a,b,c\n1,2";
        let (_, rows) = parse_str(csv, ',').unwrap();
        assert_eq!(rows[0]["a"], "1");
        assert!(!rows[0].contains_key("c"));
    }

    #[test]
    fn test_extra_cells_ignored() {
        let csv = "a,b\n1,2,3,4";
        let (_, rows) = parse_str(csv, ',').unwrap();
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_duplicate_header_first_wins() {
        let csv = "a,a\nfirst,second";
        let (_, rows) = parse_str(csv, ',').unwrap();
        assert_eq!(rows[0]["a"], "first");
    }

    #[test]
    fn test_empty_input_has_no_headers() {
        let (headers, rows) = parse_str("", ',').unwrap();
        assert!(headers.is_empty());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
        assert_eq!(detect_delimiter("\n\na;b\n"), ';');
    }

    #[test]
    fn test_auto_parse_semicolon() {
        let csv = "experiment_id;metric_name;step;value\ne1;acc;0;0.5";
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0]["metric_name"], "acc");
    }

    #[test]
    fn test_bom_stripped() {
        let bytes = "\u{feff}experiment_id,step\ne1,0".as_bytes();
        let result = parse_bytes_auto(bytes).unwrap();
        assert_eq!(result.headers[0], "experiment_id");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = decode_content(&[0x61, 0xFF, 0xFE, 0x62], "utf-8").unwrap_err();
        assert!(err.to_string().starts_with("Failed to read CSV file"));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }
}
