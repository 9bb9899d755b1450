//! Descriptive statistics over `DataFrame` columns.
//!
//! Every numeric helper ignores missing values; an empty input yields `None`
//! rather than NaN so callers can render "no value" explicitly.

use polars::prelude::*;
use serde::Serialize;

use crate::error::AppError;

/// Column values as `f64`, missing entries preserved as `None`.
pub fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>, AppError> {
    let floats = series.cast(&DataType::Float64)?;
    let values = floats.f64()?.into_iter().collect();
    Ok(values)
}

/// Non-missing, finite column values as `f64`.
pub fn present_values(series: &Series) -> Result<Vec<f64>, AppError> {
    Ok(finite_floats(series)?.into_iter().flatten().collect())
}

/// Column values rendered as strings, missing entries preserved as `None`.
pub fn text_values(series: &Series) -> Result<Vec<Option<String>>, AppError> {
    let strings = series.cast(&DataType::String)?;
    let values = strings
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Float64 view of a column with NaN and infinities turned into missing values.
pub fn finite_floats(series: &Series) -> Result<Float64Chunked, AppError> {
    let floats = series.cast(&DataType::Float64)?;
    let mut finite: Float64Chunked = floats
        .f64()?
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()))
        .collect();
    finite.rename(series.name());
    Ok(finite)
}

/// Distinct non-missing values.
pub fn distinct_count(series: &Series) -> Result<usize, AppError> {
    Ok(series.drop_nulls().n_unique()?)
}

pub fn mean(series: &Series) -> Result<Option<f64>, AppError> {
    Ok(finite_floats(series)?.mean())
}

pub fn sum(series: &Series) -> Result<f64, AppError> {
    Ok(finite_floats(series)?.sum().unwrap_or(0.0))
}

/// Sample variance (ddof = 1); `None` below two present values.
pub fn variance(series: &Series) -> Result<Option<f64>, AppError> {
    let floats = finite_floats(series)?;
    if floats.len() - floats.null_count() < 2 {
        return Ok(None);
    }
    Ok(floats.var(1))
}

pub fn std_dev(series: &Series) -> Result<Option<f64>, AppError> {
    Ok(variance(series)?.map(f64::sqrt))
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(series: &Series, q: f64) -> Result<Option<f64>, AppError> {
    let floats = finite_floats(series)?;
    Ok(floats.quantile(q.clamp(0.0, 1.0), QuantileInterpolOptions::Linear)?)
}

pub fn median(series: &Series) -> Result<Option<f64>, AppError> {
    Ok(finite_floats(series)?.median())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescription {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

pub fn is_numeric_column(series: &Series) -> bool {
    series.dtype().is_numeric()
}

pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|series| is_numeric_column(series))
        .map(|series| series.name().to_string())
        .collect()
}

/// `describe()` over the numeric columns, or the named subset.
pub fn describe(df: &DataFrame, columns: Option<&[String]>) -> Result<Vec<ColumnDescription>, AppError> {
    let names = match columns {
        Some(columns) => columns.to_vec(),
        None => numeric_column_names(df),
    };

    names
        .iter()
        .map(|name| -> Result<ColumnDescription, AppError> {
            let series = df.column(name)?;
            let floats = finite_floats(series)?;
            Ok(ColumnDescription {
                column: name.clone(),
                count: floats.len() - floats.null_count(),
                mean: floats.mean(),
                std: std_dev(series)?,
                min: floats.min(),
                q25: quantile(series, 0.25)?,
                median: floats.median(),
                q75: quantile(series, 0.75)?,
                max: floats.max(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; `None` where the coefficient is undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// Pairwise-complete correlation between the given numeric columns.
pub fn correlation(
    df: &DataFrame,
    columns: &[String],
    method: CorrelationMethod,
) -> Result<CorrelationMatrix, AppError> {
    let values = columns
        .iter()
        .map(|a| {
            columns
                .iter()
                .map(|b| pairwise_correlation(df.column(a)?, df.column(b)?, method))
                .collect::<Result<Vec<_>, AppError>>()
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

fn average_rank() -> RankOptions {
    RankOptions {
        method: RankMethod::Average,
        descending: false,
    }
}

fn pairwise_correlation(a: &Series, b: &Series, method: CorrelationMethod) -> Result<Option<f64>, AppError> {
    let pair = DataFrame::new(vec![
        finite_floats(a)?.into_series().with_name("x"),
        finite_floats(b)?.into_series().with_name("y"),
    ])?
    .drop_nulls::<String>(None)?;
    if pair.height() < 2 {
        return Ok(None);
    }

    let (x, y) = match method {
        CorrelationMethod::Pearson => (col("x"), col("y")),
        CorrelationMethod::Spearman => (
            col("x").rank(average_rank(), None),
            col("y").rank(average_rank(), None),
        ),
    };
    let out = pair
        .lazy()
        .select([pearson_corr(x, y, 1).alias("r")])
        .collect()?;

    // Constant columns come back as NaN.
    Ok(out.column("r")?.f64()?.get(0).filter(|r| r.is_finite()))
}

const KEY: &str = "key";
const STACK: &str = "stack";
const VALUE: &str = "value";

/// Value frequencies, most frequent first; ties keep first-seen order.
pub fn value_counts(series: &Series) -> Result<Vec<(String, usize)>, AppError> {
    let keys = series.cast(&DataType::String)?.with_name(KEY);
    let counts = DataFrame::new(vec![keys])?
        .lazy()
        .filter(col(KEY).is_not_null())
        .group_by_stable([col(KEY)])
        .agg([col(KEY).count().alias(VALUE)])
        .sort_by_exprs([col(VALUE)], [true], false, true)
        .collect()?;

    let keys = counts.column(KEY)?.str()?;
    let totals = counts.column(VALUE)?.cast(&DataType::UInt64)?;
    Ok(keys
        .into_iter()
        .zip(totals.u64()?.into_iter())
        .filter_map(|(key, total)| Some((key?.to_string(), total? as usize)))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Sum,
    Count,
    Min,
    Max,
    Median,
}

impl Aggregation {
    fn expr(&self, values: Expr) -> Expr {
        match self {
            Aggregation::Mean => values.mean(),
            Aggregation::Sum => values.sum(),
            Aggregation::Count => values.count(),
            Aggregation::Min => values.min(),
            Aggregation::Max => values.max(),
            Aggregation::Median => values.median(),
        }
    }
}

/// Group key as text next to the finite float values of `agg_col`.
fn keyed_values(df: &DataFrame, keys: &[(&str, &str)], agg_col: &str) -> Result<LazyFrame, AppError> {
    let mut columns = keys
        .iter()
        .map(|&(column, alias)| -> Result<Series, AppError> {
            Ok(df.column(column)?.cast(&DataType::String)?.with_name(alias))
        })
        .collect::<Result<Vec<_>, _>>()?;
    columns.push(finite_floats(df.column(agg_col)?)?.into_series().with_name(VALUE));

    let present_keys = keys
        .iter()
        .map(|&(_, alias)| col(alias).is_not_null())
        .reduce(|a, b| a.and(b))
        .unwrap_or_else(|| lit(true));
    Ok(DataFrame::new(columns)?.lazy().filter(present_keys))
}

/// Aggregates `agg_col` per distinct `group_col` value, groups sorted by key.
/// Rows whose group key is missing are dropped.
pub fn grouped_stats(
    df: &DataFrame,
    group_col: &str,
    agg_col: &str,
    aggregation: Aggregation,
) -> Result<Vec<(String, Option<f64>)>, AppError> {
    let grouped = keyed_values(df, &[(group_col, KEY)], agg_col)?
        .group_by([col(KEY)])
        .agg([aggregation.expr(col(VALUE)).alias(VALUE)])
        .sort_by_exprs([col(KEY)], [false], false, false)
        .collect()?;

    let keys = grouped.column(KEY)?.str()?;
    let values = grouped.column(VALUE)?.cast(&DataType::Float64)?;
    Ok(keys
        .into_iter()
        .zip(values.f64()?.into_iter())
        .filter_map(|(key, value)| Some((key?.to_string(), value)))
        .collect())
}

/// Sum of `value` per (`category`, `stack`) pair, in first-seen order.
pub fn stacked_sums(
    df: &DataFrame,
    category: &str,
    stack: &str,
    value: &str,
) -> Result<Vec<(String, String, f64)>, AppError> {
    let grouped = keyed_values(df, &[(category, KEY), (stack, STACK)], value)?
        .group_by_stable([col(KEY), col(STACK)])
        .agg([col(VALUE).sum()])
        .collect()?;

    let categories = grouped.column(KEY)?.str()?;
    let levels = grouped.column(STACK)?.str()?;
    let totals = grouped.column(VALUE)?.f64()?;
    Ok(categories
        .into_iter()
        .zip(levels.into_iter())
        .zip(totals.into_iter())
        .filter_map(|((cat, level), total)| {
            Some((cat?.to_string(), level?.to_string(), total.unwrap_or(0.0)))
        })
        .collect())
}

/// Bounds outside which a value is an outlier under the 1.5 × IQR rule.
pub fn iqr_bounds(series: &Series) -> Result<Option<(f64, f64)>, AppError> {
    let (Some(q1), Some(q3)) = (quantile(series, 0.25)?, quantile(series, 0.75)?) else {
        return Ok(None);
    };
    let iqr = q3 - q1;
    Ok(Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr)))
}

/// Rows of `df` whose `column` value falls outside the IQR bounds.
pub fn detect_outliers(df: &DataFrame, column: &str) -> Result<DataFrame, AppError> {
    let series = df.column(column)?;
    let Some((lower, upper)) = iqr_bounds(series)? else {
        return Ok(df.head(Some(0)));
    };

    let floats = finite_floats(series)?;
    let outside = floats.lt(lower) | floats.gt(upper);
    Ok(df.filter(&outside)?)
}
