use crate::auth::AuthError;
use crate::store::StoreError;
use medirx_types::TextError;

/// Errors surfaced by the record and profile services.
///
/// Tolerable failures (image uploads, diagnosis generation) never appear here; they are
/// reported as warnings alongside a successful result instead.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("Patient not found")]
    PatientNotFound,
    #[error("Doctor profile not found")]
    DoctorNotFound,
    #[error("User not authenticated")]
    Unauthenticated,
    #[error("Failed to create patient record: {0}")]
    CreateFailed(#[source] StoreError),
    #[error("Failed to update patient record: {0}")]
    UpdateFailed(#[source] StoreError),
    #[error(
        "patient record {id} could not be read back and cleanup also failed: read={read_error}; cleanup={cleanup_error}"
    )]
    CleanupAfterCreateFailed {
        id: String,
        #[source]
        read_error: Box<RecordError>,
        cleanup_error: StoreError,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<TextError> for RecordError {
    fn from(err: TextError) -> Self {
        RecordError::InvalidInput(err.to_string())
    }
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;
