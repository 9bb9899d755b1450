use polars::prelude::*;
use rayon::prelude::*;

use crate::error::AppError;
use crate::models::{ColumnProfile, DatasetInfo, DatasetSummary, NumericStats};
use crate::services::analysis::{self, finite_floats, text_values, value_counts};
use crate::services::inference::infer_column_type;

const SAMPLE_VALUES: usize = 5;
const TOP_VALUES: usize = 3;

/// Builds the per-column profile of a dataset. Columns are profiled in parallel.
pub fn summarize(df: &DataFrame) -> Result<DatasetSummary, AppError> {
    let start = std::time::Instant::now();

    let columns = df
        .get_columns()
        .par_iter()
        .map(profile_column)
        .collect::<Result<Vec<_>, AppError>>()?;

    let summary = DatasetSummary {
        dataset_info: DatasetInfo {
            n_rows: df.height(),
            n_columns: df.width(),
            columns: df.get_column_names().iter().map(|n| n.to_string()).collect(),
        },
        columns,
    };

    tracing::info!(
        "Summarized {} columns over {} rows in {:?}",
        summary.dataset_info.n_columns,
        summary.dataset_info.n_rows,
        start.elapsed()
    );
    Ok(summary)
}

pub fn profile_column(series: &Series) -> Result<ColumnProfile, AppError> {
    let counts = value_counts(series)?;

    let distinct = series.drop_nulls().unique_stable()?;
    let sample_values = text_values(&distinct.head(Some(SAMPLE_VALUES)))?
        .into_iter()
        .flatten()
        .collect();

    Ok(ColumnProfile {
        name: series.name().to_string(),
        dtype: series.dtype().to_string(),
        inferred_type: infer_column_type(series)?,
        n_missing: series.null_count(),
        n_unique: counts.len(),
        sample_values,
        top_values: counts.into_iter().take(TOP_VALUES).collect(),
        stats: numeric_stats(series)?,
    })
}

/// `None` for non-numeric storage and for columns with no present values.
fn numeric_stats(series: &Series) -> Result<Option<NumericStats>, AppError> {
    if !series.dtype().is_numeric() {
        return Ok(None);
    }
    let floats = finite_floats(series)?;

    let stats = match (floats.mean(), floats.median(), floats.min(), floats.max()) {
        (Some(mean), Some(median), Some(min), Some(max)) => Some(NumericStats {
            mean,
            median,
            min,
            max,
            std: analysis::std_dev(series)?,
        }),
        _ => None,
    };
    Ok(stats)
}
