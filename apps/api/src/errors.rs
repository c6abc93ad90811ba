use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::analysis::models::AnalysisResult;
use crate::analysis::AnalysisError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every body is a serialized `AnalysisResult` with `success: false`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Analysis(AnalysisError::EmptyText | AnalysisError::IncompleteCheckIn) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Analysis(AnalysisError::NotMeaningful) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Analysis(AnalysisError::Credential(_) | AnalysisError::Transport(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let result = match &self {
            AppError::NotFound(path) => AnalysisResult::failure(format!("Not found: {path}")),
            AppError::Analysis(e) => {
                if status.is_server_error() {
                    tracing::error!("Analysis failed: {e}");
                }
                e.to_result()
            }
        };

        (status, Json(result)).into_response()
    }
}
