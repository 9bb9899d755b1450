//! Rule-based insights plus an optional narrative from a text generator.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{ColumnType, DatasetSummary};

const TOP_N: usize = 3;
const PROMPT_COLUMNS: usize = 10;
const MAX_CHART_SUGGESTIONS: usize = 5;

/// Anything that can turn a prompt into prose.
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, AppError>>;
}

/// Result of the optional narrative step. Never an error for the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum LlmOutcome {
    Generated(String),
    Unavailable,
    Failed(String),
}

impl LlmOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            LlmOutcome::Generated(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub rule_based: Vec<String>,
    pub llm: LlmOutcome,
    pub chart_suggestions: Vec<String>,
}

#[derive(Clone, Default)]
pub struct InsightGenerator {
    provider: Option<Arc<dyn TextGenerator>>,
}

impl InsightGenerator {
    pub fn new(provider: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { provider }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn generate(&self, summary: &DatasetSummary) -> Insights {
        let rule_based = rule_based_insights(summary);

        let Some(provider) = &self.provider else {
            return Insights {
                rule_based,
                llm: LlmOutcome::Unavailable,
                chart_suggestions: Vec::new(),
            };
        };

        let prompt = build_prompt(summary);
        let start = std::time::Instant::now();
        let llm = match provider.generate(&prompt).await {
            Ok(text) => {
                tracing::info!("{} produced insights in {:?}", provider.name(), start.elapsed());
                LlmOutcome::Generated(text)
            }
            Err(e) => {
                tracing::warn!("{} insight generation failed: {}", provider.name(), e);
                LlmOutcome::Failed(e.to_string())
            }
        };

        let chart_suggestions = llm.text().map(chart_suggestions).unwrap_or_default();
        Insights {
            rule_based,
            llm,
            chart_suggestions,
        }
    }
}

pub fn rule_based_insights(summary: &DatasetSummary) -> Vec<String> {
    let info = &summary.dataset_info;
    let mut insights = vec![format!(
        "The dataset has {} rows and {} columns.",
        info.n_rows, info.n_columns
    )];

    let mut missing: Vec<_> = summary.columns.iter().filter(|c| c.n_missing > 0).collect();
    missing.sort_by(|a, b| b.n_missing.cmp(&a.n_missing));
    for column in missing.iter().take(TOP_N) {
        let share = column.n_missing as f64 / info.n_rows.max(1) as f64 * 100.0;
        insights.push(format!(
            "Column '{}' has {} missing values ({:.1}%).",
            column.name, column.n_missing, share
        ));
    }

    let mut means: Vec<(&str, f64)> = summary
        .columns
        .iter()
        .filter(|c| c.inferred_type == ColumnType::Numeric)
        .filter_map(|c| c.stats.as_ref().map(|s| (c.name.as_str(), s.mean)))
        .collect();
    means.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (name, mean) in means.into_iter().take(TOP_N) {
        insights.push(format!(
            "Numeric column '{}' has mean ≈ {}.",
            name,
            format_significant(mean)
        ));
    }

    for column in summary
        .columns
        .iter()
        .filter(|c| c.inferred_type == ColumnType::Categorical)
        .take(TOP_N)
    {
        let levels: Vec<String> = column
            .top_values
            .iter()
            .map(|(value, count)| format!("{} ({})", value, count))
            .collect();
        insights.push(format!("Top values for '{}': {}.", column.name, levels.join(", ")));
    }

    insights
}

pub fn build_prompt(summary: &DatasetSummary) -> String {
    let mut parts = vec![format!(
        "Dataset has {} rows and {} columns.",
        summary.dataset_info.n_rows, summary.dataset_info.n_columns
    )];
    for column in summary.columns.iter().take(PROMPT_COLUMNS) {
        parts.push(format!(
            "Column '{}': type={}, missing={}, unique={}.",
            column.name, column.inferred_type, column.n_missing, column.n_unique
        ));
    }

    format!(
        "You are a helpful data analyst. Given the dataset summary below, produce 3 concise, \
         prioritized business insights (1-2 sentences each) and suggest 2 charts to visualize them.\n\n{}",
        parts.join("\n")
    )
}

/// First few non-blank lines of a narrative that talks about charts.
pub fn chart_suggestions(text: &str) -> Vec<String> {
    if !text.to_lowercase().contains("chart") {
        return Vec::new();
    }
    text.lines()
        .take(MAX_CHART_SUGGESTIONS)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Three significant digits, switching to exponent form for large or tiny values.
pub fn format_significant(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }

    let scientific = format!("{:.2e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..3).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs());
    }

    let decimals = (2 - exponent).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
