use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderValue, Method},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::DatasetSummary,
    services::{
        cleaner::{CleanOptions, MissingPolicy},
        dashboard::{generate_dashboard, prepare, write_dashboard},
        insights::Insights,
        loader::SourceFormat,
    },
    AppState,
};

pub fn routes(cors_origin: &str) -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!("Invalid CORS origin {:?}, allowing any origin", cors_origin);
            cors.allow_origin(Any)
        }
    };

    Router::new()
        .route("/process", post(process_upload))
        .route("/dashboard", get(serve_dashboard))
        .route("/insights", post(upload_insights))
        .layer(cors)
}

/// Query parameters shared by the upload endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct CleanParams {
    missing: Option<String>,
    fill_value: Option<String>,
    drop_duplicates: Option<bool>,
}

impl CleanParams {
    fn clean_options(&self, default_missing: MissingPolicy) -> Result<CleanOptions, AppError> {
        let missing = match self.missing.as_deref() {
            None => default_missing,
            Some(method) => MissingPolicy::parse(Some(method), self.fill_value.as_deref())?,
        };
        Ok(CleanOptions {
            drop_duplicates: self.drop_duplicates.unwrap_or(true),
            missing,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    html_url: String,
    dashboard_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    summary: DatasetSummary,
    insights: Insights,
}

struct Upload {
    file_name: String,
    data: Bytes,
}

async fn read_upload(mut multipart: Multipart, max_file_size: usize) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Uploaded file has no name".to_string()))?;
        SourceFormat::from_file_name(&file_name)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {}", e)))?;
        if data.len() > max_file_size {
            return Err(AppError::InvalidInput(format!(
                "File is {} bytes, the limit is {} bytes",
                data.len(),
                max_file_size
            )));
        }

        tracing::info!("Received {} ({}KB)", file_name, data.len() / 1024);
        return Ok(Upload { file_name, data });
    }

    Err(AppError::MissingParameter("file".to_string()))
}

async fn process_upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CleanParams>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, AppError> {
    let start = std::time::Instant::now();
    let options = params.clean_options(MissingPolicy::Drop)?;
    let upload = read_upload(multipart, state.config.max_file_size).await?;

    let dashboard_id = Uuid::new_v4().to_string();
    let path = state.config.output_dir.join(format!("{}.html", dashboard_id));

    let task_path = path.clone();
    tokio::task::spawn_blocking(move || -> Result<(), AppError> {
        let dashboard = generate_dashboard(&upload.data, &upload.file_name, &options, None)?;
        write_dashboard(&task_path, &dashboard.html)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Dashboard task failed: {}", e)))??;

    state.dashboards.insert(dashboard_id.clone(), path);
    tracing::info!("Dashboard {} ready in {:?}", dashboard_id, start.elapsed());

    Ok(Json(ProcessResponse {
        html_url: format!("{}/dashboard?id={}", state.config.public_url, dashboard_id),
        dashboard_id,
    }))
}

async fn serve_dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::MissingParameter("id".to_string()))?;
    Uuid::parse_str(&id).map_err(|_| AppError::InvalidInput(format!("Invalid dashboard id: {}", id)))?;

    let path = state
        .dashboards
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Dashboard {}", id)))?;

    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            state.dashboards.invalidate(&id);
            Err(AppError::NotFound(format!("Dashboard {}", id)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn upload_insights(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CleanParams>,
    multipart: Multipart,
) -> Result<Json<InsightsResponse>, AppError> {
    let options = params.clean_options(MissingPolicy::Keep)?;
    let upload = read_upload(multipart, state.config.max_file_size).await?;

    let summary = tokio::task::spawn_blocking(move || {
        prepare(&upload.data, &upload.file_name, &options).map(|prepared| prepared.summary)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Summary task failed: {}", e)))??;

    let insights = state.insights.generate(&summary).await;
    Ok(Json(InsightsResponse { summary, insights }))
}
