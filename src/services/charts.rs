//! Picks which columns feed which dashboard charts.

use polars::prelude::*;

use crate::error::AppError;
use crate::models::{ChartPlan, ChartSelection, ColumnType, InferredTypes};
use crate::services::analysis::{distinct_count, text_values, variance};
use crate::services::dates::is_date_string;

pub const MAX_PIE_SLICES: usize = 15;
pub const MAX_LINE_SERIES: usize = 2;

pub fn plan_charts(df: &DataFrame, types: &InferredTypes) -> Result<ChartPlan, AppError> {
    let numeric = types.columns_of(ColumnType::Numeric);
    let mut categorical = Vec::new();
    let mut datetime = types.columns_of(ColumnType::Datetime);

    // Date-like categoricals move to the datetime pool for charting only.
    for name in types.columns_of(ColumnType::Categorical) {
        if all_dates(df.column(&name)?)? {
            tracing::debug!("Charting categorical column {} as datetime", name);
            datetime.push(name);
        } else {
            categorical.push(name);
        }
    }

    let mut charts = Vec::new();

    let time_col = time_column(df, &datetime)?;
    if let Some(time) = &time_col {
        if !numeric.is_empty() {
            charts.push(ChartSelection::Line {
                time: time.clone(),
                values: numeric.iter().take(MAX_LINE_SERIES).cloned().collect(),
            });
        }
    }

    if let (Some(category), Some(value)) = (categorical.first(), numeric.first()) {
        charts.push(ChartSelection::Bar {
            category: category.clone(),
            value: value.clone(),
            stack: categorical.get(1).cloned(),
        });
    }

    if let Some(category) = pie_column(df, &categorical)? {
        charts.push(ChartSelection::Pie {
            category,
            value: numeric.first().cloned(),
        });
    }

    if let Some(column) = histogram_column(df, &numeric)? {
        charts.push(ChartSelection::Histogram { column });
    }

    if numeric.len() >= 2 {
        charts.push(ChartSelection::Heatmap {
            columns: numeric.clone(),
        });
    }

    tracing::info!(
        "Planned {} charts ({} numeric, {} categorical, {} datetime columns)",
        charts.len(),
        numeric.len(),
        categorical.len(),
        datetime.len()
    );

    Ok(ChartPlan {
        numeric_columns: numeric,
        categorical_columns: categorical,
        datetime_columns: datetime,
        charts,
    })
}

/// True when the column has present values and every one parses as a date.
fn all_dates(series: &Series) -> Result<bool, AppError> {
    let present: Vec<String> = text_values(series)?.into_iter().flatten().collect();
    Ok(!present.is_empty() && present.iter().all(|v| is_date_string(v)))
}

/// Datetime column with the fewest missing values; the first wins ties.
fn time_column(df: &DataFrame, datetime: &[String]) -> Result<Option<String>, AppError> {
    let mut best: Option<(&String, usize)> = None;
    for name in datetime {
        let missing = df.column(name)?.null_count();
        if best.map_or(true, |(_, fewest)| missing < fewest) {
            best = Some((name, missing));
        }
    }
    Ok(best.map(|(name, _)| name.clone()))
}

fn pie_column(df: &DataFrame, categorical: &[String]) -> Result<Option<String>, AppError> {
    for name in categorical {
        if distinct_count(df.column(name)?)? <= MAX_PIE_SLICES {
            return Ok(Some(name.clone()));
        }
    }
    Ok(None)
}

/// Numeric column with the largest sample variance. Undefined variance
/// ranks below every defined one; the first column wins ties.
fn histogram_column(df: &DataFrame, numeric: &[String]) -> Result<Option<String>, AppError> {
    let mut best: Option<(&String, Option<f64>)> = None;
    for name in numeric {
        let var = variance(df.column(name)?)?;
        let better = match best {
            None => true,
            Some((_, best_var)) => match (var, best_var) {
                (Some(v), Some(b)) => v > b,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if better {
            best = Some((name, var));
        }
    }
    Ok(best.map(|(name, _)| name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChartKind;
    use crate::services::inference::infer_column_types;
    use pretty_assertions::assert_eq;

    fn plan(df: &DataFrame) -> ChartPlan {
        plan_charts(df, &infer_column_types(df).unwrap()).unwrap()
    }

    #[test]
    fn histogram_uses_highest_variance_column() {
        let df = df![
            "steady" => [10.0, 11.0, 10.5, 10.2],
            "spread" => [1.0, 100.0, 50.0, 3.0],
        ]
        .unwrap();
        let plan = plan(&df);
        assert_eq!(
            plan.find(ChartKind::Histogram),
            Some(&ChartSelection::Histogram { column: "spread".to_string() })
        );
    }

    #[test]
    fn undefined_variance_loses_to_defined() {
        let df = df![
            "single" => [Some(5.0), None, None],
            "many" => [Some(1.0), Some(2.0), Some(2.0)],
        ]
        .unwrap();
        let plan = plan(&df);
        assert_eq!(
            plan.find(ChartKind::Histogram),
            Some(&ChartSelection::Histogram { column: "many".to_string() })
        );
    }

    #[test]
    fn heatmap_needs_two_numeric_columns() {
        let one = df!["city" => ["a", "b"], "sales" => [1.0, 2.0]].unwrap();
        assert!(plan(&one).find(ChartKind::Heatmap).is_none());

        let two = df!["x" => [1.0, 2.0, 3.0], "y" => [3.0, 1.0, 2.0]].unwrap();
        assert_eq!(
            plan(&two).find(ChartKind::Heatmap),
            Some(&ChartSelection::Heatmap { columns: vec!["x".to_string(), "y".to_string()] })
        );
    }

    #[test]
    fn sales_example_plans_line_bar_and_pie() {
        let df = df![
            "country" => ["A", "B", "A"],
            "sales" => [100i64, 150, 120],
            "month" => ["2020-01", "2020-01", "2020-02"],
        ]
        .unwrap();
        let plan = plan(&df);

        assert_eq!(
            plan.find(ChartKind::Line),
            Some(&ChartSelection::Line { time: "month".into(), values: vec!["sales".into()] })
        );
        assert_eq!(
            plan.find(ChartKind::Bar),
            Some(&ChartSelection::Bar { category: "country".into(), value: "sales".into(), stack: None })
        );
        assert_eq!(
            plan.find(ChartKind::Pie),
            Some(&ChartSelection::Pie { category: "country".into(), value: Some("sales".into()) })
        );
        assert!(plan.find(ChartKind::Heatmap).is_none());
    }

    #[test]
    fn date_like_categorical_is_moved_to_datetime_pool() {
        let df = df![
            "day" => ["01/02/2021", "02/02/2021"],
            "qty" => [1.0, 2.0],
        ]
        .unwrap();
        let mut types = InferredTypes::default();
        types.push("day", ColumnType::Categorical);
        types.push("qty", ColumnType::Numeric);

        let plan = plan_charts(&df, &types).unwrap();
        assert_eq!(plan.datetime_columns, vec!["day".to_string()]);
        assert!(plan.categorical_columns.is_empty());
        assert!(plan.find(ChartKind::Line).is_some());
        assert_eq!(types.get("day"), Some(ColumnType::Categorical));
    }

    #[test]
    fn time_column_has_fewest_missing() {
        let df = df![
            "start" => [Some("2021-01-01"), None, Some("2021-01-03")],
            "end" => [Some("2021-02-01"), Some("2021-02-02"), Some("2021-02-03")],
            "v" => [1.0, 2.0, 3.0],
        ]
        .unwrap();
        let plan = plan(&df);
        assert!(matches!(
            plan.find(ChartKind::Line),
            Some(ChartSelection::Line { time, .. }) if time == "end"
        ));
    }

    #[test]
    fn pie_skips_wide_categoricals_and_counts_without_numeric() {
        let wide: Vec<String> = (0..16).map(|i| format!("w{}", i)).collect();
        let narrow: Vec<&str> = (0..16).map(|i| if i % 2 == 0 { "even" } else { "odd" }).collect();
        let df = DataFrame::new(vec![Series::new("wide", wide), Series::new("narrow", narrow)]).unwrap();

        let mut types = InferredTypes::default();
        types.push("wide", ColumnType::Categorical);
        types.push("narrow", ColumnType::Categorical);

        let plan = plan_charts(&df, &types).unwrap();
        assert_eq!(
            plan.find(ChartKind::Pie),
            Some(&ChartSelection::Pie { category: "narrow".into(), value: None })
        );
        assert!(plan.find(ChartKind::Bar).is_none());
        assert!(plan.find(ChartKind::Histogram).is_none());
    }
}
