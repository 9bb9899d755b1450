//! Column type inference.
//!
//! The checks run in a fixed order and the first match wins: storage dtype,
//! then a date-parse sample, then numeric storage, then cardinality. Moving a
//! check changes the outcome for borderline columns.

use polars::prelude::*;

use crate::error::AppError;
use crate::models::{ColumnType, InferredTypes};
use crate::services::analysis::{distinct_count, text_values};
use crate::services::dates::is_date_string;

/// Leading non-missing values tried as dates.
pub const DATE_SAMPLE_SIZE: usize = 50;
/// Parsed fraction must be strictly above this.
pub const DATE_PARSE_THRESHOLD: f64 = 0.8;
pub const MAX_CATEGORICAL_UNIQUE: usize = 20;
pub const CATEGORICAL_UNIQUE_RATIO: f64 = 0.05;

pub fn infer_column_types(df: &DataFrame) -> Result<InferredTypes, AppError> {
    let mut types = InferredTypes::default();
    for series in df.get_columns() {
        let column_type = infer_column_type(series)?;
        tracing::debug!("Column {} inferred as {}", series.name(), column_type);
        types.push(series.name(), column_type);
    }
    Ok(types)
}

pub fn infer_column_type(series: &Series) -> Result<ColumnType, AppError> {
    if is_datetime_dtype(series.dtype()) {
        return Ok(ColumnType::Datetime);
    }

    let present = series.drop_nulls();
    // Nothing to sample or parse: straight to the cardinality rule.
    if present.is_empty() {
        return Ok(by_cardinality(0, series.len()));
    }

    let sample: Vec<String> = text_values(&present.head(Some(DATE_SAMPLE_SIZE)))?
        .into_iter()
        .flatten()
        .collect();
    if date_parse_fraction(&sample) > DATE_PARSE_THRESHOLD {
        return Ok(ColumnType::Datetime);
    }

    if series.dtype().is_numeric() {
        return Ok(ColumnType::Numeric);
    }

    Ok(by_cardinality(distinct_count(&present)?, series.len()))
}

fn by_cardinality(unique_count: usize, len: usize) -> ColumnType {
    let ratio = unique_count as f64 / len.max(1) as f64;
    if unique_count <= MAX_CATEGORICAL_UNIQUE || ratio < CATEGORICAL_UNIQUE_RATIO {
        ColumnType::Categorical
    } else {
        ColumnType::Text
    }
}

pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Date | DataType::Datetime(_, _))
}

/// Fraction of `values` that parse as a date or date-time.
pub fn date_parse_fraction(values: &[String]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let parsed = values.iter().filter(|v| is_date_string(v)).count();
    parsed as f64 / values.len() as f64
}
