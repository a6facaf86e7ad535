//! `POST /calc/technical`: fixed-rate quantity take-offs.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use buildcompare_core::{calculate, CalcType, CalculationReport};
use serde::Deserialize;

use super::super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CalculationRequest {
    pub calc_type: String,
    pub area: f64,
    /// Brick type for `bricks`, number of coats for `paint`.
    #[serde(default = "default_variable")]
    pub variable: String,
}

fn default_variable() -> String {
    String::from("standard")
}

pub async fn technical(
    body: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<Json<CalculationReport>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;
    let calc_type: CalcType = request.calc_type.parse()?;
    Ok(Json(calculate(calc_type, request.area, &request.variable)?))
}
