use std::path::Path;

use polars::prelude::*;

use crate::error::AppError;
use crate::models::{ChartPlan, DatasetSummary};
use crate::services::charts::plan_charts;
use crate::services::cleaner::{clean, CleanOptions};
use crate::services::insights::Insights;
use crate::services::loader::load_bytes;
use crate::services::render::{render_dashboard, title_from_file_name};
use crate::services::summary::summarize;

#[derive(Debug)]
pub struct Dashboard {
    pub title: String,
    pub html: String,
    pub plan: ChartPlan,
    pub summary: DatasetSummary,
}

/// Loaded and cleaned data plus its summary, ready for charting or insights.
pub struct PreparedData {
    pub df: DataFrame,
    pub summary: DatasetSummary,
}

pub fn prepare(file_data: &[u8], file_name: &str, options: &CleanOptions) -> Result<PreparedData, AppError> {
    let raw = load_bytes(file_data, file_name)?;
    let df = clean(&raw, options)?;
    let summary = summarize(&df)?;
    Ok(PreparedData { df, summary })
}

pub fn generate_dashboard(
    file_data: &[u8],
    file_name: &str,
    options: &CleanOptions,
    insights: Option<&Insights>,
) -> Result<Dashboard, AppError> {
    let start = std::time::Instant::now();
    let PreparedData { df, summary } = prepare(file_data, file_name, options)?;
    build_dashboard(&df, summary, file_name, insights).map(|dashboard| {
        tracing::info!("Generated dashboard for {} in {:?}", file_name, start.elapsed());
        dashboard
    })
}

pub fn build_dashboard(
    df: &DataFrame,
    summary: DatasetSummary,
    file_name: &str,
    insights: Option<&Insights>,
) -> Result<Dashboard, AppError> {
    let plan = plan_charts(df, &summary.inferred_types())?;
    let title = title_from_file_name(file_name);
    let html = render_dashboard(df, &plan, &title, insights)?;

    Ok(Dashboard {
        title,
        html,
        plan,
        summary,
    })
}

pub fn write_dashboard(path: &Path, html: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    tracing::info!("Dashboard written to {}", path.display());
    Ok(())
}
