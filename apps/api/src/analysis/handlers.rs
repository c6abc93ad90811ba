//! Axum route handlers for the Analysis API.

use axum::{extract::State, Json};
use tracing::info;

use crate::analysis::models::{AnalysisRequest, AnalysisResult};
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/analysis/analyze
///
/// Free text or a five-rating check-in in, `AnalysisResult` out. Nothing is persisted;
/// storing a successful result is the caller's job.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let result = state.analyzer.analyze_request(request).await?;

    info!("Analysis served: rating={:?}", result.day_rating());

    Ok(Json(result))
}
