//! Self-contained HTML dashboard rendering.
//!
//! Charts are emitted as plotly.js figure JSON and drawn client-side; the page
//! only depends on the plotly CDN script.

use std::path::Path;

use polars::prelude::*;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::{ChartPlan, ChartSelection};
use crate::services::analysis::{
    self, correlation, describe, numeric_values, present_values, text_values, Aggregation,
    ColumnDescription, CorrelationMethod,
};
use crate::services::insights::{Insights, LlmOutcome};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const HISTOGRAM_BINS: usize = 20;
const KPI_COLORS: [&str; 4] = ["#00E5FF", "#FF6B6B", "#FFD93D", "#8B5CF6"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    TimeTrends,
    CategoryAnalysis,
    PerformanceMetrics,
}

impl Section {
    const ALL: [Section; 3] = [
        Section::TimeTrends,
        Section::CategoryAnalysis,
        Section::PerformanceMetrics,
    ];

    fn title(&self) -> &'static str {
        match self {
            Section::TimeTrends => "Time Trends",
            Section::CategoryAnalysis => "Category Analysis",
            Section::PerformanceMetrics => "Performance Metrics",
        }
    }

    fn of(chart: &ChartSelection) -> Self {
        match chart {
            ChartSelection::Line { .. } => Section::TimeTrends,
            ChartSelection::Bar { .. } | ChartSelection::Pie { .. } => Section::CategoryAnalysis,
            ChartSelection::Histogram { .. } | ChartSelection::Heatmap { .. } => {
                Section::PerformanceMetrics
            }
        }
    }
}

pub fn render_dashboard(
    df: &DataFrame,
    plan: &ChartPlan,
    title: &str,
    insights: Option<&Insights>,
) -> Result<String, AppError> {
    let start = std::time::Instant::now();

    let mut sections = String::new();
    let mut chart_id = 0;
    for section in Section::ALL {
        sections.push_str(&format!(
            "<h2 class='section-title'>{}</h2><div class='chart-container'>",
            section.title()
        ));
        let mut drawn = 0;
        for chart in plan.charts.iter().filter(|c| Section::of(c) == section) {
            for figure in chart_figures(df, chart)? {
                sections.push_str(&chart_box(chart_id, &figure));
                chart_id += 1;
                drawn += 1;
            }
        }
        if drawn == 0 {
            sections.push_str("<p class='empty'>No suitable columns for this section.</p>");
        }
        sections.push_str("</div>");
    }

    let title = escape_html(title);
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title} | Data Insights Dashboard</title>
<script src="{PLOTLY_CDN}"></script>
<style>{STYLE}</style>
</head>
<body>
<header><h1>{title}</h1><p>Automated data insights dashboard</p></header>
<div class="main-content">
{kpis}
{insights}
{sections}
<div class="summary-section"><h2>Summary Statistics</h2>{summary}</div>
</div>
</body>
</html>
"#,
        kpis = kpi_cards(df, &plan.numeric_columns)?,
        insights = insights.map(insights_panel).unwrap_or_default(),
        summary = summary_table(df)?,
    );

    tracing::info!(
        "Rendered dashboard with {} charts ({} bytes) in {:?}",
        chart_id,
        html.len(),
        start.elapsed()
    );
    Ok(html)
}

/// `monthly_sales_2023.csv` becomes `Monthly Sales 2023`.
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .replace('_', " ");

    let mut title = String::with_capacity(stem.len());
    let mut prev_alpha = false;
    for c in stem.chars() {
        if prev_alpha {
            title.extend(c.to_lowercase());
        } else {
            title.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    title
}

/// Compact rupee amount: `M` for millions, `L` for lakhs, `K` for thousands.
pub fn format_rupees(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("₹{:.2}M", value / 1_000_000.0)
    } else if value >= 100_000.0 {
        format!("₹{:.2}L", value / 100_000.0)
    } else if value >= 1_000.0 {
        format!("₹{:.2}K", value / 1_000.0)
    } else {
        format!("₹{}", format_thousands(value, 0))
    }
}

/// Fixed decimals with comma thousands separators.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// JSON safe to inline in a `<script>` element.
pub fn script_json(value: &Value) -> String {
    value
        .to_string()
        .replace("</", "<\\/")
        .replace("<!--", "<\\!--")
}

fn chart_box(id: usize, figure: &Value) -> String {
    format!(
        "<div class='chart-box'><div id='chart-{id}' class='chart'></div>\
         <script>Plotly.newPlot('chart-{id}', {figure}.data, {figure}.layout, {{responsive: true}});</script></div>",
        id = id,
        figure = script_json(figure),
    )
}

fn layout(title: String) -> Value {
    json!({
        "title": { "text": title },
        "paper_bgcolor": "#1E293B",
        "plot_bgcolor": "#1E293B",
        "font": { "color": "#F5F5F5" },
        "margin": { "t": 60, "l": 50, "r": 30, "b": 50 },
    })
}

/// Plotly figures for one chart selection. A line selection yields one
/// figure per value column.
fn chart_figures(df: &DataFrame, chart: &ChartSelection) -> Result<Vec<Value>, AppError> {
    let figures = match chart {
        ChartSelection::Line { time, values } => {
            let x = text_values(df.column(time)?)?;
            values
                .iter()
                .map(|value| -> Result<Value, AppError> {
                    let y = numeric_values(df.column(value)?)?;
                    Ok(json!({
                        "data": [{
                            "type": "scatter",
                            "mode": "lines+markers",
                            "x": x,
                            "y": y,
                            "name": value,
                            "line": { "width": 3 },
                        }],
                        "layout": layout(format!("{} over {}", value, time)),
                    }))
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        ChartSelection::Bar { category, value, stack } => {
            vec![bar_figure(df, category, value, stack.as_deref())?]
        }
        ChartSelection::Pie { category, value } => {
            let (labels, values): (Vec<String>, Vec<f64>) = match value {
                Some(value) => analysis::grouped_stats(df, category, value, Aggregation::Sum)?
                    .into_iter()
                    .map(|(label, total)| (label, total.unwrap_or(0.0)))
                    .unzip(),
                None => analysis::value_counts(df.column(category)?)?
                    .into_iter()
                    .map(|(label, count)| (label, count as f64))
                    .unzip(),
            };
            vec![json!({
                "data": [{
                    "type": "pie",
                    "labels": labels,
                    "values": values,
                    "hole": 0.35,
                }],
                "layout": layout(format!("Distribution by {}", category)),
            })]
        }
        ChartSelection::Histogram { column } => {
            let values = present_values(df.column(column)?)?;
            let mut hist_layout = layout(format!("Distribution of {}", column));
            hist_layout["bargap"] = json!(0.05);
            vec![json!({
                "data": [{
                    "type": "histogram",
                    "x": values,
                    "nbinsx": HISTOGRAM_BINS,
                    "marker": { "color": "#FF6B6B" },
                }],
                "layout": hist_layout,
            })]
        }
        ChartSelection::Heatmap { columns } => {
            let matrix = correlation(df, columns, CorrelationMethod::Pearson)?;
            if matrix.is_empty() {
                Vec::new()
            } else {
                vec![json!({
                    "data": [{
                        "type": "heatmap",
                        "z": matrix.values,
                        "x": matrix.columns,
                        "y": matrix.columns,
                        "colorscale": "Viridis",
                        "zmin": -1,
                        "zmax": 1,
                        "texttemplate": "%{z:.2f}",
                    }],
                    "layout": layout("Correlation Heatmap".to_string()),
                })]
            }
        }
    };
    Ok(figures)
}

/// Summed bar per category, one stacked trace per level of `stack`.
fn bar_figure(df: &DataFrame, category: &str, value: &str, stack: Option<&str>) -> Result<Value, AppError> {
    let traces = match stack {
        None => {
            let (x, y): (Vec<String>, Vec<Option<f64>>) =
                analysis::grouped_stats(df, category, value, Aggregation::Sum)?.into_iter().unzip();
            vec![json!({ "type": "bar", "x": x, "y": y, "name": value })]
        }
        Some(stack) => {
            let sums = analysis::stacked_sums(df, category, stack, value)?;

            let mut x_order: Vec<&str> = Vec::new();
            let mut level_order: Vec<&str> = Vec::new();
            for (cat, level, _) in &sums {
                if !x_order.contains(&cat.as_str()) {
                    x_order.push(cat);
                }
                if !level_order.contains(&level.as_str()) {
                    level_order.push(level);
                }
            }

            level_order
                .iter()
                .map(|&level| {
                    let y: Vec<Option<f64>> = x_order
                        .iter()
                        .map(|&cat| {
                            sums.iter()
                                .find(|(c, l, _)| c == cat && l == level)
                                .map(|(_, _, total)| *total)
                        })
                        .collect();
                    json!({ "type": "bar", "x": x_order, "y": y, "name": level })
                })
                .collect()
        }
    };

    let mut bar_layout = layout(format!("{} by {}", value, category));
    bar_layout["barmode"] = json!("stack");
    Ok(json!({ "data": traces, "layout": bar_layout }))
}

fn kpi_cards(df: &DataFrame, numeric: &[String]) -> Result<String, AppError> {
    let mut cards = vec![
        ("Total Rows", format_thousands(df.height() as f64, 0)),
        ("Total Columns", df.width().to_string()),
    ];

    if let Some(col) = numeric.iter().find(|c| c.to_lowercase().contains("revenue")) {
        let total = analysis::sum(df.column(col)?)?;
        cards.push(("Revenue", format_rupees(total)));
    }

    if let Some(col) = numeric.iter().find(|c| {
        let lower = c.to_lowercase();
        lower.contains("unit") && lower.contains("sold")
    }) {
        let total = analysis::sum(df.column(col)?)?;
        cards.push(("Units Sold", format_thousands(total.trunc(), 0)));
    }

    let mut html = String::from("<div class='kpi-container'>");
    for (i, (label, value)) in cards.iter().enumerate() {
        html.push_str(&format!(
            "<div class='kpi' style='border-color:{}'><h3>{}</h3><p>{}</p></div>",
            KPI_COLORS[i % KPI_COLORS.len()],
            label,
            escape_html(value)
        ));
    }
    html.push_str("</div>");
    Ok(html)
}

fn summary_table(df: &DataFrame) -> Result<String, AppError> {
    let rows = describe(df, None)?;
    if rows.is_empty() {
        return Ok("<p>No numeric data available for summary statistics.</p>".to_string());
    }

    let cell = |v: Option<f64>| v.map(|v| format_thousands(v, 2)).unwrap_or_else(|| "-".to_string());
    let mut html = String::from(
        "<table class='summary-table'><thead><tr><th>Column</th><th>Count</th><th>Mean</th>\
         <th>Std Dev</th><th>Min</th><th>25th %ile</th><th>Median</th><th>75th %ile</th>\
         <th>Max</th></tr></thead><tbody>",
    );
    for ColumnDescription { column, count, mean, std, min, q25, median, q75, max } in rows {
        html.push_str(&format!("<tr><td>{}</td>", escape_html(&column)));
        for value in [Some(count as f64), mean, std, min, q25, median, q75, max] {
            html.push_str(&format!("<td>{}</td>", cell(value)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    Ok(html)
}

fn insights_panel(insights: &Insights) -> String {
    let mut html = String::from("<div class='insights-section'><h2>Key Insights</h2><ul>");
    for line in &insights.rule_based {
        html.push_str(&format!("<li>{}</li>", escape_html(line)));
    }
    html.push_str("</ul>");

    if let LlmOutcome::Generated(text) = &insights.llm {
        html.push_str("<div class='narrative'>");
        for paragraph in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            html.push_str(&format!("<p>{}</p>", escape_html(paragraph)));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    html
}

const STYLE: &str = r#"
body { font-family: 'Poppins', 'Segoe UI', sans-serif; background: radial-gradient(circle at top left, #0F2027, #203A43, #2C5364); color: #F5F5F5; margin: 0; }
header { background: linear-gradient(90deg, #141E30, #243B55); color: #00E5FF; text-align: center; padding: 40px 0 30px; box-shadow: 0 8px 25px rgba(0, 0, 0, 0.4); }
h1 { font-size: 2.4em; margin: 0; }
.main-content { padding: 40px 60px; }
.kpi-container { display: flex; justify-content: center; gap: 15px; margin: 20px auto 40px; flex-wrap: wrap; max-width: 95%; }
.kpi { flex: 1; background: #1E293B; border: 2px solid; border-radius: 12px; text-align: center; padding: 12px 5px; min-width: 160px; box-shadow: 0 4px 12px rgba(0,0,0,0.3); }
.kpi h3 { font-size: 1em; margin-bottom: 6px; color: #FFD93D; }
.section-title { color: #FFD93D; font-size: 1.6em; margin: 30px 10px 15px; border-left: 6px solid #00E5FF; padding-left: 12px; }
.chart-container { display: grid; grid-template-columns: repeat(auto-fit, minmax(550px, 1fr)); gap: 35px; margin-bottom: 50px; }
.chart-box { background: #1E293B; border-radius: 18px; border: 2px solid rgba(0, 229, 255, 0.6); padding: 20px; }
.chart { min-height: 420px; }
.empty { color: #94A3B8; margin: 10px; }
.insights-section, .summary-section { background: #1E293B; padding: 25px; border-radius: 15px; border: 2px solid #00E5FF; margin: 30px 0; }
.summary-table { width: 100%; border-collapse: collapse; }
.summary-table th, .summary-table td { padding: 8px 12px; border-bottom: 1px solid #334155; text-align: right; }
.summary-table th:first-child, .summary-table td:first-child { text-align: left; }
"#;
