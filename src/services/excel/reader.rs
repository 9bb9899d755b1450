use super::utils::*;
use std::collections::HashSet;
use std::io::Cursor;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use crate::error::AppError;
use crate::services::dates::{from_excel_serial, parse_datetime};

/// Reads the first worksheet of an `.xlsx`/`.xls` workbook, first row as header.
pub fn read_workbook(file_data: &[u8]) -> Result<DataFrame, AppError> {
    let cursor = Cursor::new(file_data.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| {
        tracing::error!("Failed to open Excel file: {}", e);
        e
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    tracing::debug!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

    let sheet_name = sheet_names
        .first()
        .ok_or_else(|| AppError::InvalidInput("No sheets found in workbook".to_string()))?;

    let range = workbook.worksheet_range(sheet_name)?;
    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();

    if rows.is_empty() {
        tracing::warn!("Sheet {} is empty", sheet_name);
        return Ok(DataFrame::empty());
    }

    create_dataframe(&rows)
}

pub fn create_dataframe(rows: &[Vec<Data>]) -> Result<DataFrame, AppError> {
    let mut existing_names = HashSet::new();
    let width = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let headers: Vec<String> = (0..width)
        .map(|idx| {
            let raw = rows
                .first()
                .and_then(|row| row.get(idx))
                .map(|cell| cell.to_string())
                .unwrap_or_default();
            unique_column_name(&raw, idx, &mut existing_names)
        })
        .collect();

    let mut columns = Vec::with_capacity(width);

    for (col_idx, header) in headers.iter().enumerate() {
        let values: Vec<Data> = rows.iter()
            .skip(1) // Skip header row
            .map(|row| row.get(col_idx).cloned().unwrap_or(Data::Empty))
            .collect();

        columns.push(column_from_cells(header, &values)?);
    }

    Ok(DataFrame::new(columns)?)
}

fn column_from_cells(name: &str, values: &[Data]) -> Result<Series, AppError> {
    let series = match detect_column_kind(values) {
        CellKind::Integer => {
            let nums: Vec<Option<i64>> = values.iter().map(|v| match v {
                Data::Int(i) => Some(*i),
                _ => None,
            }).collect();
            Series::new(name, nums)
        }
        CellKind::Float => {
            let nums: Vec<Option<f64>> = values.iter().map(|v| match v {
                Data::Float(f) => Some(*f),
                Data::Int(i) => Some(*i as f64),
                _ => None,
            }).collect();
            Series::new(name, nums)
        }
        CellKind::Boolean => {
            let flags: Vec<Option<bool>> = values.iter().map(|v| match v {
                Data::Bool(b) => Some(*b),
                _ => None,
            }).collect();
            Series::new(name, flags)
        }
        CellKind::DateTime => {
            let millis: Vec<Option<i64>> = values.iter().map(|v| {
                let dt = match v {
                    Data::DateTime(d) => from_excel_serial(d.as_f64()),
                    Data::DateTimeIso(s) => parse_datetime(s),
                    _ => None,
                };
                dt.map(|dt| dt.and_utc().timestamp_millis())
            }).collect();
            Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
        CellKind::Text | CellKind::Empty => {
            let strings: Vec<Option<String>> = values.iter().map(|v| {
                if is_missing(v) { None } else { Some(v.to_string()) }
            }).collect();
            Series::new(name, strings)
        }
    };

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn builds_typed_columns_from_rows() {
        let rows = vec![
            vec![s("country"), s("sales"), s("active")],
            vec![s("A"), Data::Int(100), Data::Bool(true)],
            vec![s("B"), Data::Float(150.5), Data::Empty],
        ];
        let df = create_dataframe(&rows).unwrap();

        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("country").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("sales").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("active").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(df.column("active").unwrap().null_count(), 1);
    }

    #[test]
    fn ragged_rows_are_padded_with_missing() {
        let rows = vec![
            vec![s("a"), s("b")],
            vec![Data::Int(1)],
            vec![Data::Int(2), Data::Int(3)],
        ];
        let df = create_dataframe(&rows).unwrap();
        assert_eq!(df.column("b").unwrap().null_count(), 1);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn duplicate_headers_stay_unique() {
        let rows = vec![
            vec![s("x"), s("x")],
            vec![Data::Int(1), Data::Int(2)],
        ];
        let df = create_dataframe(&rows).unwrap();
        assert_eq!(df.get_column_names(), vec!["x", "x.1"]);
    }

    #[test]
    fn iso_datetime_cells_become_datetime_columns() {
        let rows = vec![
            vec![s("when")],
            vec![Data::DateTimeIso("2021-03-04T05:06:07".into())],
        ];
        let df = create_dataframe(&rows).unwrap();
        assert!(matches!(df.column("when").unwrap().dtype(), DataType::Datetime(_, _)));
    }
}
