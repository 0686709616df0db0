//! HTTP error mapping.

use api_shared::auth::AuthHeaderError;
use api_shared::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use medirx_core::auth::AuthError;
use medirx_core::RecordError;

/// Errors returned by REST handlers. The body always carries the underlying message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    AuthHeader(#[from] AuthHeaderError),
    #[error("{0}")]
    BadRequest(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Record(RecordError::Auth(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Record(err) => record_status(err),
            ApiError::AuthHeader(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn record_status(err: &RecordError) -> StatusCode {
    match err {
        RecordError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RecordError::Unauthenticated => StatusCode::UNAUTHORIZED,
        RecordError::PatientNotFound | RecordError::DoctorNotFound => StatusCode::NOT_FOUND,
        RecordError::Auth(auth) => match auth {
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::EmailInUse => StatusCode::CONFLICT,
            AuthError::WeakPassword(_) | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorRes {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use medirx_core::store::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(RecordError::InvalidInput("age".into())), 400),
            (ApiError::from(RecordError::Unauthenticated), 401),
            (ApiError::from(RecordError::PatientNotFound), 404),
            (ApiError::from(RecordError::DoctorNotFound), 404),
            (ApiError::from(AuthError::InvalidCredentials), 401),
            (ApiError::from(AuthError::EmailInUse), 409),
            (ApiError::from(AuthError::WeakPassword("short".into())), 400),
            (ApiError::from(AuthHeaderError::Missing), 401),
            (
                ApiError::from(RecordError::Store(StoreError::Unavailable("down".into()))),
                500,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status().as_u16(), expected, "{err}");
        }
    }

    #[test]
    fn test_message_passes_through() {
        let err = ApiError::from(RecordError::PatientNotFound);
        assert_eq!(err.to_string(), "Patient not found");
    }
}
