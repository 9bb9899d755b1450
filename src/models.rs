use serde::Serialize;
use std::fmt;

/// Semantic classification of a column, independent of how it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Datetime,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Datetime => "datetime",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column name to inferred type, in dataset column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferredTypes {
    entries: Vec<(String, ColumnType)>,
}

impl InferredTypes {
    pub fn push(&mut self, name: impl Into<String>, column_type: ColumnType) {
        self.entries.push((name.into(), column_type));
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.entries
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, t)| *t)
    }

    pub fn columns_of(&self, column_type: ColumnType) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, t)| *t == column_type)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.entries.iter().map(|(name, t)| (name.as_str(), *t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub inferred_type: ColumnType,
    pub n_missing: usize,
    pub n_unique: usize,
    pub sample_values: Vec<String>,
    pub top_values: Vec<(String, usize)>,
    #[serde(flatten)]
    pub stats: Option<NumericStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub n_rows: usize,
    pub n_columns: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub dataset_info: DatasetInfo,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetSummary {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|profile| profile.name == name)
    }

    pub fn inferred_types(&self) -> InferredTypes {
        let mut types = InferredTypes::default();
        for profile in &self.columns {
            types.push(profile.name.clone(), profile.inferred_type);
        }
        types
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Histogram,
    Heatmap,
}

/// One chart and the columns that feed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartSelection {
    Line { time: String, values: Vec<String> },
    Bar { category: String, value: String, stack: Option<String> },
    Pie { category: String, value: Option<String> },
    Histogram { column: String },
    Heatmap { columns: Vec<String> },
}

impl ChartSelection {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartSelection::Line { .. } => ChartKind::Line,
            ChartSelection::Bar { .. } => ChartKind::Bar,
            ChartSelection::Pie { .. } => ChartKind::Pie,
            ChartSelection::Histogram { .. } => ChartKind::Histogram,
            ChartSelection::Heatmap { .. } => ChartKind::Heatmap,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartPlan {
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub datetime_columns: Vec<String>,
    pub charts: Vec<ChartSelection>,
}

impl ChartPlan {
    pub fn find(&self, kind: ChartKind) -> Option<&ChartSelection> {
        self.charts.iter().find(|chart| chart.kind() == kind)
    }
}
