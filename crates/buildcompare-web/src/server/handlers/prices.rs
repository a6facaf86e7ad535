//! `GET /api/v1/prices` and `POST /api/v1/compare`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use buildcompare_core::{
    CacheMode, ComparisonResult, DataMode, Location, Material, PriceListing, PriceQuery,
    RankingOptions, SortKey, SupplierQuote,
};
use buildcompare_core::error::validate_non_negative;
use serde::{Deserialize, Serialize};

use super::super::error::ApiError;
use super::super::AppState;

#[derive(Debug, Deserialize)]
pub struct PriceParams {
    #[serde(default)]
    pub query: String,
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
    /// Skip the listing cache for this lookup.
    #[serde(default)]
    pub refresh: bool,
}

pub async fn prices(
    State(state): State<AppState>,
    params: Result<Query<PriceParams>, QueryRejection>,
) -> Result<Json<Vec<PriceListing>>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;

    let location = Location::from_parts(params.region.as_deref(), params.lat, params.lng, params.radius)?;
    let query = PriceQuery::new(params.query, location)?;
    let mode = if params.refresh {
        CacheMode::Refresh
    } else {
        CacheMode::Use
    };

    let lookup = state.prices.lookup(&query, mode).await;
    tracing::info!(
        query = query.query(),
        listings = lookup.listings.len(),
        skipped_sources = lookup.failures.len(),
        cached = lookup.cached,
        "price lookup complete"
    );
    Ok(Json(lookup.listings))
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub materials: Vec<Material>,
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub mode: DataMode,
    pub results: Vec<ComparedMaterial>,
}

#[derive(Debug, Serialize)]
pub struct ComparedMaterial {
    #[serde(flatten)]
    pub result: ComparisonResult,
    /// Quotes within `radius_km`, ordered by `sort_by`.
    pub ranked: Vec<SupplierQuote>,
}

pub async fn compare(
    State(state): State<AppState>,
    body: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;

    if request.materials.is_empty() {
        return Err(ApiError::invalid("materials must not be empty"));
    }
    for material in &request.materials {
        material.validate()?;
    }

    let sort = request
        .sort_by
        .as_deref()
        .map(str::parse::<SortKey>)
        .transpose()?
        .unwrap_or_default();
    if let Some(radius) = request.radius_km {
        validate_non_negative("radius_km", radius)?;
    }
    let location = match (request.lat, request.lng) {
        (None, None) => Location::from_parts(request.region.as_deref(), None, None, None)?,
        (lat, lng) => Location::from_parts(None, lat, lng, request.radius_km)?,
    };
    let options = RankingOptions {
        radius_km: request.radius_km,
        sort,
    };

    let report = state.prices.compare_materials(request.materials, location).await;
    let results = report
        .results
        .into_iter()
        .map(|result| ComparedMaterial {
            ranked: result.ranked(&options),
            result,
        })
        .collect();

    Ok(Json(CompareResponse {
        mode: report.mode,
        results,
    }))
}
