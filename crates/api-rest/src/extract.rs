//! Request extractors: bearer authentication and multipart patient forms.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::auth::bearer_token;
use axum::extract::{FromRequestParts, Multipart};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use medirx_core::auth::Identity;
use medirx_core::images::ImageFile;
use serde::de::DeserializeOwned;

pub const PATIENT_FIELD: &str = "patient";
pub const MEDICAL_IMAGE_FIELD: &str = "medical_image";
pub const PATIENT_PHOTO_FIELD: &str = "patient_photo";

/// The identity behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedDoctor(pub Identity);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedDoctor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;
        let identity = state.auth.verify(token).await?;
        Ok(AuthenticatedDoctor(identity))
    }
}

/// A decoded `multipart/form-data` patient submission.
#[derive(Debug)]
pub struct PatientForm<T> {
    pub patient: T,
    pub medical_image: Option<ImageFile>,
    pub patient_photo: Option<ImageFile>,
}

/// Reads the JSON `patient` part and the optional image parts.
///
/// Empty file parts are treated as absent, which is what browsers send for an untouched file
/// input.
pub async fn read_patient_form<T: DeserializeOwned>(
    mut multipart: Multipart,
) -> ApiResult<PatientForm<T>> {
    let mut patient = None;
    let mut medical_image = None;
    let mut patient_photo = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            PATIENT_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                let parsed = serde_json::from_str(&text).map_err(|e| {
                    ApiError::BadRequest(format!("invalid patient payload: {e}"))
                })?;
                patient = Some(parsed);
            }
            MEDICAL_IMAGE_FIELD | PATIENT_PHOTO_FIELD => {
                let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                if bytes.is_empty() {
                    continue;
                }
                let file = ImageFile::new(file_name, content_type, bytes.to_vec());
                if name == MEDICAL_IMAGE_FIELD {
                    medical_image = Some(file);
                } else {
                    patient_photo = Some(file);
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let patient = patient.ok_or_else(|| {
        ApiError::BadRequest(format!("missing '{PATIENT_FIELD}' multipart field"))
    })?;
    Ok(PatientForm {
        patient,
        medical_image,
        patient_photo,
    })
}
