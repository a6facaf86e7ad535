//! `POST /api/analyze`: materials from a site photo.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;
use buildcompare_core::{AnalysisReport, ImageUpload};

use super::super::error::ApiError;
use super::super::AppState;

const DEFAULT_FILE_NAME: &str = "image.jpg";

/// Accepts multipart form data with a `file` part and an optional `fileName` field.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;

    let mut image: Option<ImageUpload> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let upload_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid(format!("failed to read file: {e}")))?;
                image = Some(ImageUpload::new(
                    upload_name.unwrap_or_else(|| DEFAULT_FILE_NAME.to_owned()),
                    content_type,
                    bytes.to_vec(),
                ));
            }
            Some("fileName") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid(format!("failed to read fileName: {e}")))?;
                file_name = Some(text).filter(|name| !name.trim().is_empty());
            }
            _ => {}
        }
    }

    let file_name = file_name
        .or_else(|| image.as_ref().map(|upload| upload.file_name.clone()))
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_owned());

    let report = state.analyzer.analyze(&file_name, image.as_ref()).await?;
    tracing::info!(
        mode = %report.mode,
        materials = report.materials.len(),
        "analysis complete"
    );
    Ok(Json(report))
}
