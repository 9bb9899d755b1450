//! Duplicate removal and missing-value handling.

use polars::prelude::*;

use crate::error::AppError;
use crate::services::analysis::{self, finite_floats};

/// How missing cells are resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MissingPolicy {
    #[default]
    Keep,
    Drop,
    Constant(String),
    Mean,
    Median,
    Mode,
    ForwardBackward,
}

impl MissingPolicy {
    /// Maps the `missing` / `fill_value` request parameters onto a policy.
    pub fn parse(method: Option<&str>, fill_value: Option<&str>) -> Result<Self, AppError> {
        let method = method.map(|m| m.trim().to_lowercase());
        match method.as_deref() {
            None | Some("") | Some("none") | Some("keep") => Ok(MissingPolicy::Keep),
            Some("drop") => Ok(MissingPolicy::Drop),
            Some("fill") => fill_value
                .map(|value| MissingPolicy::Constant(value.to_string()))
                .ok_or_else(|| {
                    AppError::MissingParameter("fill_value is required when missing=fill".to_string())
                }),
            Some("mean") => Ok(MissingPolicy::Mean),
            Some("median") => Ok(MissingPolicy::Median),
            Some("mode") => Ok(MissingPolicy::Mode),
            Some("ffill") | Some("bfill") | Some("ffill_bfill") => Ok(MissingPolicy::ForwardBackward),
            Some(other) => Err(AppError::InvalidInput(format!(
                "Unknown missing value method: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanOptions {
    pub drop_duplicates: bool,
    pub missing: MissingPolicy,
}

impl CleanOptions {
    /// What the dashboard applies when the caller asks for nothing specific.
    pub fn dashboard_default() -> Self {
        Self {
            drop_duplicates: true,
            missing: MissingPolicy::Drop,
        }
    }
}

/// Returns a cleaned copy; the input frame is left untouched.
pub fn clean(df: &DataFrame, options: &CleanOptions) -> Result<DataFrame, AppError> {
    let start = std::time::Instant::now();
    let mut cleaned = df.clone();

    if options.drop_duplicates {
        let before = cleaned.height();
        cleaned = drop_duplicate_rows(&cleaned)?;
        tracing::debug!("Removed {} duplicate rows", before - cleaned.height());
    }

    cleaned = match &options.missing {
        MissingPolicy::Keep => cleaned,
        MissingPolicy::Drop => cleaned.drop_nulls::<String>(None)?,
        policy => fill_missing(cleaned, policy)?,
    };

    tracing::info!(
        "Cleaned data: {:?} -> {:?} in {:?}",
        df.shape(),
        cleaned.shape(),
        start.elapsed()
    );
    Ok(cleaned)
}

/// Keeps the first occurrence of every distinct row, preserving order.
pub fn drop_duplicate_rows(df: &DataFrame) -> Result<DataFrame, AppError> {
    if df.width() == 0 {
        return Ok(df.clone());
    }
    Ok(df.unique_stable(None, UniqueKeepStrategy::First, None)?)
}

fn fill_missing(mut df: DataFrame, policy: &MissingPolicy) -> Result<DataFrame, AppError> {
    let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();

    for name in names {
        let series = df.column(&name)?;
        if series.null_count() == 0 {
            continue;
        }

        let filled = match policy {
            MissingPolicy::Constant(value) => Some(fill_constant(series, value)?),
            MissingPolicy::Mean => fill_mean(series)?,
            MissingPolicy::Median => fill_median(series)?,
            MissingPolicy::Mode => Some(fill_mode(series)?),
            MissingPolicy::ForwardBackward => Some(
                series
                    .fill_null(FillNullStrategy::Forward(None))?
                    .fill_null(FillNullStrategy::Backward(None))?,
            ),
            MissingPolicy::Keep | MissingPolicy::Drop => None,
        };

        match filled {
            Some(filled) => {
                df.with_column(filled)?;
            }
            None => tracing::debug!("Left missing values in {} unresolved", name),
        }
    }

    Ok(df)
}

/// Missing cells of `series` replaced by `filler`'s first value.
fn fill_with(series: &Series, filler: &Series) -> Result<Series, AppError> {
    let filler = filler.new_from_index(0, series.len());
    Ok(series.zip_with(&series.is_not_null(), &filler)?)
}

fn fill_constant(series: &Series, value: &str) -> Result<Series, AppError> {
    if series.dtype().is_numeric() {
        if let Ok(number) = value.trim().parse::<f64>() {
            let floats = finite_floats(series)?.fill_null_with_values(number)?;
            return Ok(floats.into_series());
        }
    }

    let text = series.cast(&DataType::String)?;
    fill_with(&text, &Series::new(series.name(), &[value]))
}

/// Mean fill; non-numeric columns are skipped.
fn fill_mean(series: &Series) -> Result<Option<Series>, AppError> {
    if !series.dtype().is_numeric() {
        return Ok(None);
    }
    let filled = finite_floats(series)?.into_series().fill_null(FillNullStrategy::Mean)?;
    Ok(Some(filled))
}

/// Median fill; non-numeric and all-missing columns are skipped.
fn fill_median(series: &Series) -> Result<Option<Series>, AppError> {
    if !series.dtype().is_numeric() {
        return Ok(None);
    }
    let Some(median) = analysis::median(series)? else {
        return Ok(None);
    };
    Ok(Some(finite_floats(series)?.fill_null_with_values(median)?.into_series()))
}

/// Most frequent value, ties to the first seen; an all-missing column
/// becomes empty strings.
fn fill_mode(series: &Series) -> Result<Series, AppError> {
    let Some((mode, _)) = analysis::value_counts(series)?.into_iter().next() else {
        return Ok(Series::new(series.name(), vec![""; series.len()]));
    };

    let texts = series.cast(&DataType::String)?;
    let mode_row = texts
        .str()?
        .into_iter()
        .position(|v| v == Some(mode.as_str()))
        .ok_or_else(|| AppError::Internal(format!("Mode of {} not found", series.name())))?;

    fill_with(series, &series.slice(mode_row as i64, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analysis::{numeric_values, text_values};
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df![
            "city" => [Some("Pune"), None, Some("Delhi"), Some("Pune"), Some("Pune")],
            "sales" => [Some(10.0), Some(20.0), None, Some(10.0), Some(40.0)],
        ]
        .unwrap()
    }

    fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        text_values(df.column(name).unwrap()).unwrap()
    }

    #[test]
    fn parse_fill_requires_value() {
        let err = MissingPolicy::parse(Some("fill"), None).unwrap_err();
        assert!(matches!(err, AppError::MissingParameter(_)));

        let policy = MissingPolicy::parse(Some("fill"), Some("0")).unwrap();
        assert_eq!(policy, MissingPolicy::Constant("0".to_string()));
    }

    #[test]
    fn parse_known_and_unknown_methods() {
        assert_eq!(MissingPolicy::parse(None, None).unwrap(), MissingPolicy::Keep);
        assert_eq!(MissingPolicy::parse(Some("Drop"), None).unwrap(), MissingPolicy::Drop);
        assert_eq!(MissingPolicy::parse(Some("ffill"), None).unwrap(), MissingPolicy::ForwardBackward);
        assert!(matches!(
            MissingPolicy::parse(Some("interpolate"), None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn drop_duplicates_keeps_first_occurrences_in_order() {
        let df = df![
            "a" => [1i64, 2, 1, 3, 2],
            "b" => ["x", "y", "x", "z", "q"],
        ]
        .unwrap();
        let options = CleanOptions { drop_duplicates: true, missing: MissingPolicy::Keep };
        let cleaned = clean(&df, &options).unwrap();

        assert_eq!(cleaned.height(), 4);
        assert_eq!(
            strings(&cleaned, "b"),
            vec![Some("x".into()), Some("y".into()), Some("z".into()), Some("q".into())]
        );
        assert_eq!(df.height(), 5);
    }

    #[test]
    fn missing_cells_count_as_equal_when_deduplicating() {
        let df = df!["a" => [None, Some(1i64), None]].unwrap();
        let deduped = drop_duplicate_rows(&df).unwrap();
        assert_eq!(deduped.height(), 2);
    }

    #[test]
    fn drop_removes_rows_with_any_missing_value() {
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::Drop };
        let cleaned = clean(&sample(), &options).unwrap();
        assert_eq!(cleaned.height(), 3);
    }

    #[test]
    fn mean_fill_skips_text_columns() {
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::Mean };
        let cleaned = clean(&sample(), &options).unwrap();

        assert_eq!(cleaned.column("city").unwrap().null_count(), 1);
        let sales = numeric_values(cleaned.column("sales").unwrap()).unwrap();
        assert_eq!(sales[2], Some(20.0));
    }

    #[test]
    fn median_fill_uses_present_values() {
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::Median };
        let cleaned = clean(&sample(), &options).unwrap();
        let sales = numeric_values(cleaned.column("sales").unwrap()).unwrap();
        assert_eq!(sales[2], Some(15.0));
    }

    #[test]
    fn mode_fill_uses_most_frequent_value() {
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::Mode };
        let cleaned = clean(&sample(), &options).unwrap();

        assert_eq!(strings(&cleaned, "city")[1], Some("Pune".to_string()));
        assert_eq!(numeric_values(cleaned.column("sales").unwrap()).unwrap()[2], Some(10.0));
    }

    #[test]
    fn mode_ties_go_to_the_first_value_seen() {
        let df = df!["tier" => [Some("gold"), None, Some("silver"), Some("silver"), Some("gold")]].unwrap();
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::Mode };
        let cleaned = clean(&df, &options).unwrap();
        assert_eq!(strings(&cleaned, "tier")[1], Some("gold".to_string()));
    }

    #[test]
    fn mean_fill_of_integer_column_is_fractional() {
        let df = df!["units" => [Some(1i64), None, Some(2)]].unwrap();
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::Mean };
        let cleaned = clean(&df, &options).unwrap();
        assert_eq!(
            numeric_values(cleaned.column("units").unwrap()).unwrap(),
            vec![Some(1.0), Some(1.5), Some(2.0)]
        );
    }

    #[test]
    fn mode_fill_of_all_missing_column_uses_empty_string() {
        let df = df!["note" => [Option::<&str>::None, None]].unwrap();
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::Mode };
        let cleaned = clean(&df, &options).unwrap();
        assert_eq!(strings(&cleaned, "note"), vec![Some(String::new()), Some(String::new())]);
    }

    #[test]
    fn forward_then_backward_fill() {
        let df = df!["v" => [None, Some(1i64), None, Some(3), None]].unwrap();
        let options = CleanOptions { drop_duplicates: false, missing: MissingPolicy::ForwardBackward };
        let cleaned = clean(&df, &options).unwrap();
        assert_eq!(
            numeric_values(cleaned.column("v").unwrap()).unwrap(),
            vec![Some(1.0), Some(1.0), Some(1.0), Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn constant_fill_is_numeric_when_value_parses() {
        let options = CleanOptions {
            drop_duplicates: false,
            missing: MissingPolicy::Constant("0".to_string()),
        };
        let cleaned = clean(&sample(), &options).unwrap();

        assert!(cleaned.column("sales").unwrap().dtype().is_numeric());
        assert_eq!(numeric_values(cleaned.column("sales").unwrap()).unwrap()[2], Some(0.0));
        assert_eq!(strings(&cleaned, "city")[1], Some("0".to_string()));
    }

    #[test]
    fn constant_fill_with_text_converts_numeric_column() {
        let options = CleanOptions {
            drop_duplicates: false,
            missing: MissingPolicy::Constant("unknown".to_string()),
        };
        let cleaned = clean(&sample(), &options).unwrap();
        assert_eq!(cleaned.column("sales").unwrap().dtype(), &DataType::String);
        assert_eq!(strings(&cleaned, "sales")[2], Some("unknown".to_string()));
    }
}
