//! Reads uploaded bytes or local files into a `DataFrame`.

use std::io::Cursor;
use std::path::Path;

use encoding_rs::WINDOWS_1252;
use polars::prelude::*;
use serde_json::Value;

use crate::error::AppError;
use crate::services::excel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Excel,
    Json,
}

impl SourceFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self, AppError> {
        let lower = file_name.trim().to_lowercase();
        if lower.ends_with(".csv") {
            Ok(SourceFormat::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Ok(SourceFormat::Excel)
        } else if lower.ends_with(".json") {
            Ok(SourceFormat::Json)
        } else {
            Err(AppError::UnsupportedFormat(file_name.to_string()))
        }
    }
}

pub fn load_bytes(file_data: &[u8], file_name: &str) -> Result<DataFrame, AppError> {
    let start = std::time::Instant::now();
    let format = SourceFormat::from_file_name(file_name)?;

    let df = match format {
        SourceFormat::Csv => read_csv(&decode_text(file_data, file_name)?)?,
        SourceFormat::Excel => excel::read_workbook(file_data)?,
        SourceFormat::Json => read_json_records(&decode_text(file_data, file_name)?)?,
    };

    tracing::info!(
        "Loaded {}: {} rows, {} columns in {:?}",
        file_name,
        df.height(),
        df.width(),
        start.elapsed()
    );
    Ok(df)
}

pub fn load_path(path: &Path) -> Result<DataFrame, AppError> {
    if !path.exists() {
        return Err(AppError::FileNotFound(path.display().to_string()));
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid file name: {}", path.display())))?;

    // Reject before reading the whole file into memory.
    SourceFormat::from_file_name(file_name)?;

    let file_data = std::fs::read(path)?;
    load_bytes(&file_data, file_name)
}

/// UTF-8 first; anything else is treated as Latin-1.
pub fn decode_text(file_data: &[u8], file_name: &str) -> Result<String, AppError> {
    match std::str::from_utf8(file_data) {
        Ok(text) => Ok(text.trim_start_matches('\u{feff}').to_string()),
        Err(e) => {
            tracing::warn!(
                "UTF-8 decode of {} failed at byte {}, retrying with Latin-1",
                file_name,
                e.valid_up_to()
            );
            let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(file_data);
            if had_errors {
                return Err(AppError::DecodeFailure(file_name.to_string()));
            }
            Ok(text.into_owned())
        }
    }
}

fn read_csv(text: &str) -> Result<DataFrame, AppError> {
    if text.trim().is_empty() {
        return Ok(DataFrame::empty());
    }

    let df = CsvReader::new(Cursor::new(text.as_bytes().to_vec()))
        .has_header(true)
        .infer_schema(None)
        .finish()?;
    Ok(df)
}

/// Records-oriented JSON: `[{"col": value, ...}, ...]`.
fn read_json_records(text: &str) -> Result<DataFrame, AppError> {
    let parsed: Value = serde_json::from_str(text)?;
    let records = parsed
        .as_array()
        .ok_or_else(|| AppError::InvalidInput("JSON input must be an array of records".to_string()))?;
    if records.iter().any(|record| !record.is_object()) {
        return Err(AppError::InvalidInput("Every JSON record must be an object".to_string()));
    }
    if records.is_empty() {
        return Ok(DataFrame::empty());
    }

    let df = JsonReader::new(Cursor::new(text.as_bytes().to_vec()))
        .with_json_format(JsonFormat::Json)
        .finish()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SALES_CSV: &[u8] = b"country,sales,month\nA,100,2020-01\nB,150,2020-01\nA,120,2020-02\n";

    #[test]
    fn dispatches_on_extension() {
        assert_eq!(SourceFormat::from_file_name("a.CSV").unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_file_name("a.xls").unwrap(), SourceFormat::Excel);
        assert_eq!(SourceFormat::from_file_name("a.xlsx").unwrap(), SourceFormat::Excel);
        assert_eq!(SourceFormat::from_file_name("a.json").unwrap(), SourceFormat::Json);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_bytes(b"hello", "notes.txt").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[test]
    fn reads_csv_bytes() {
        let df = load_bytes(SALES_CSV, "sales.csv").unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert!(df.column("sales").unwrap().dtype().is_numeric());
        assert_eq!(df.column("country").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn latin1_csv_is_decoded_after_utf8_failure() {
        // "café" with 0xE9 as a single Latin-1 byte
        let bytes = b"name,score\ncaf\xe9,1\n";
        let df = load_bytes(bytes, "latin.csv").unwrap();
        let name = df.column("name").unwrap();
        assert_eq!(name.str().unwrap().get(0), Some("café"));
    }

    #[test]
    fn reads_json_records_in_key_order() {
        let json = br#"[{"b": 1, "a": "x"}, {"b": 2.5, "c": true}, {"a": null}]"#;
        let df = load_bytes(json, "data.json").unwrap();
        assert_eq!(df.get_column_names(), vec!["b", "a", "c"]);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("a").unwrap().null_count(), 2);
        assert_eq!(df.column("c").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn json_must_be_records() {
        let err = load_bytes(br#"{"a": [1, 2]}"#, "data.json").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = load_bytes(br#"[{"a": 1}, 2]"#, "data.json").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn empty_json_array_is_an_empty_frame() {
        let df = load_bytes(b"[]", "data.json").unwrap();
        assert_eq!(df.shape(), (0, 0));
    }

    #[test]
    fn missing_path_is_file_not_found() {
        let err = load_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));
    }

    #[test]
    fn loads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SALES_CSV).unwrap();

        let df = load_path(&path).unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn unsupported_path_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(matches!(load_path(&path).unwrap_err(), AppError::UnsupportedFormat(_)));
    }
}
