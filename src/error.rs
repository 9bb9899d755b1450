use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unsupported file type for {0}")]
    UnsupportedFormat(String),
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    #[error("Failed to decode {0}")]
    DecodeFailure(String),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] polars::prelude::PolarsError),
    #[error("Excel error: {0}")]
    Excel(#[from] calamine::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("LLM error: {0}")]
    Llm(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnsupportedFormat(_)
            | AppError::MissingParameter(_)
            | AppError::DecodeFailure(_)
            | AppError::InvalidInput(_)
            | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::FileNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Llm(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Io(_)
            | AppError::DataFrame(_)
            | AppError::Excel(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
