//! `POST /api/v1/estimator/boq`: model-drafted bill of quantities.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use buildcompare_core::{BoqEstimate, ProjectSpec};

use super::super::error::ApiError;
use super::super::AppState;

pub async fn boq(
    State(state): State<AppState>,
    body: Result<Json<ProjectSpec>, JsonRejection>,
) -> Result<Json<BoqEstimate>, ApiError> {
    let Json(project) = body.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;

    let estimate = state.estimator.estimate(&project).await?;
    tracing::info!(model = %estimate.model, materials = estimate.materials.len(), "bill of quantities drafted");
    Ok(Json(estimate))
}
