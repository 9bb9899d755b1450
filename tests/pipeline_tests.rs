use std::io::Write;

use insight_dashboard::models::{ChartKind, ChartSelection, ColumnType};
use insight_dashboard::services::{
    cleaner::{clean, CleanOptions, MissingPolicy},
    dashboard::{build_dashboard, generate_dashboard, write_dashboard},
    insights::{InsightGenerator, LlmOutcome},
    loader::load_path,
    summary::summarize,
};

const ORDERS_CSV: &str = "\
order_date,region,category,revenue,units_sold,discount
2023-01-01,North,Toys,1200.50,10,0.1
2023-01-02,South,Books,800.00,4,0.0
2023-01-03,North,Books,450.25,3,0.05
2023-01-04,East,Toys,2300.00,15,0.2
2023-01-04,East,Toys,2300.00,15,0.2
2023-01-05,West,Games,,7,0.1
";

fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content).unwrap();
    path
}

#[test]
fn csv_file_becomes_a_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&dir, "regional_orders.csv", ORDERS_CSV.as_bytes());

    let df = clean(&load_path(&input).unwrap(), &CleanOptions::dashboard_default()).unwrap();
    assert_eq!(df.height(), 4);

    let summary = summarize(&df).unwrap();
    let types = summary.inferred_types();
    assert_eq!(types.get("order_date"), Some(ColumnType::Datetime));
    assert_eq!(types.get("region"), Some(ColumnType::Categorical));
    assert_eq!(types.get("revenue"), Some(ColumnType::Numeric));

    let dashboard = build_dashboard(&df, summary, "regional_orders.csv", None).unwrap();
    assert_eq!(dashboard.title, "Regional Orders");
    assert_eq!(
        dashboard.plan.find(ChartKind::Line),
        Some(&ChartSelection::Line {
            time: "order_date".to_string(),
            values: vec!["revenue".to_string(), "units_sold".to_string()],
        })
    );
    assert_eq!(
        dashboard.plan.find(ChartKind::Bar),
        Some(&ChartSelection::Bar {
            category: "region".to_string(),
            value: "revenue".to_string(),
            stack: Some("category".to_string()),
        })
    );
    assert_eq!(
        dashboard.plan.find(ChartKind::Histogram),
        Some(&ChartSelection::Histogram { column: "revenue".to_string() })
    );
    assert!(dashboard.plan.find(ChartKind::Heatmap).is_some());

    // 1200.50 + 800 + 450.25 + 2300
    assert!(dashboard.html.contains("<h3>Revenue</h3><p>₹4.75K</p>"));
    assert!(dashboard.html.contains("<h3>Units Sold</h3><p>32</p>"));

    let output = dir.path().join("out").join("dashboard.html");
    write_dashboard(&output, &dashboard.html).unwrap();
    assert!(std::fs::read_to_string(output).unwrap().starts_with("<!DOCTYPE html>"));
}

#[test]
fn json_records_render_without_charts_for_missing_kinds() {
    let json = br#"[
        {"name": "alpha", "score": 3},
        {"name": "beta", "score": 5},
        {"name": "gamma", "score": 4}
    ]"#;
    let options = CleanOptions { drop_duplicates: true, missing: MissingPolicy::Keep };
    let dashboard = generate_dashboard(json, "scores.json", &options, None).unwrap();

    assert!(dashboard.plan.find(ChartKind::Line).is_none());
    assert!(dashboard.plan.find(ChartKind::Heatmap).is_none());
    assert!(dashboard.plan.find(ChartKind::Pie).is_some());
    assert!(dashboard.html.contains("No suitable columns for this section."));
}

#[test]
fn insights_are_embedded_when_requested() {
    let df = clean(
        &insight_dashboard::services::loader::load_bytes(ORDERS_CSV.as_bytes(), "orders.csv").unwrap(),
        &CleanOptions { drop_duplicates: true, missing: MissingPolicy::Keep },
    )
    .unwrap();
    let summary = summarize(&df).unwrap();

    let insights = tokio_test::block_on(InsightGenerator::default().generate(&summary));
    assert_eq!(insights.llm, LlmOutcome::Unavailable);
    assert!(insights
        .rule_based
        .contains(&"Column 'revenue' has 1 missing values (20.0%).".to_string()));

    let dashboard = build_dashboard(&df, summary, "orders.csv", Some(&insights)).unwrap();
    assert!(dashboard.html.contains("Key Insights"));
    assert!(dashboard.html.contains("The dataset has 5 rows and 6 columns."));
}

#[test]
fn latin1_file_on_disk_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&dir, "cities.csv", b"city,visits\nS\xe3o Paulo,3\nZ\xfcrich,4\n");
    let df = load_path(&input).unwrap();
    let summary = summarize(&df).unwrap();
    assert_eq!(summary.column("city").unwrap().sample_values, vec!["São Paulo", "Zürich"]);
}
