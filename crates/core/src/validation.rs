//! Input validation utilities.
//!
//! Everything here runs before any network call: a record with missing fields or an image
//! of the wrong type or size is rejected without touching the image host, the generator or
//! the store.

use crate::constants::{ALLOWED_IMAGE_TYPES, MAX_IMAGE_BYTES, MAX_PATIENT_AGE};
use crate::images::ImageFile;
use crate::patient::{NewPatient, PatientChanges};
use crate::{RecordError, RecordResult};

/// Media type sent by clients that do not know the real type of a file.
const GENERIC_MEDIA_TYPE: &str = "application/octet-stream";

/// Validates that an age is within the accepted range.
///
/// # Errors
///
/// Returns a `RecordError::InvalidInput` if `age` exceeds the maximum.
pub fn validate_age(age: u32) -> RecordResult<()> {
    if age > MAX_PATIENT_AGE {
        return Err(RecordError::InvalidInput(format!(
            "age must be between 0 and {MAX_PATIENT_AGE}"
        )));
    }
    Ok(())
}

/// Validates a new patient record.
///
/// Name, symptoms and the doctor's diagnosis description are non-empty by construction
/// (`NonEmptyText`); only the age needs checking here.
pub fn validate_new_patient(patient: &NewPatient) -> RecordResult<()> {
    validate_age(patient.age)
}

pub fn validate_patient_changes(changes: &PatientChanges) -> RecordResult<()> {
    if let Some(age) = changes.age {
        validate_age(age)?;
    }
    Ok(())
}

/// Validates an image and returns its media type.
///
/// The declared media type is used when present; otherwise the type is sniffed from the
/// file's leading bytes.
///
/// # Errors
///
/// Returns a `RecordError::InvalidInput` if the image is empty, larger than 5 MiB, or not a
/// JPEG, PNG or WebP image.
pub fn validate_image(image: &ImageFile) -> RecordResult<String> {
    if image.bytes.is_empty() {
        return Err(RecordError::InvalidInput(format!(
            "image '{}' is empty",
            image.file_name
        )));
    }

    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(RecordError::InvalidInput(format!(
            "image '{}' exceeds the maximum size of 5MB",
            image.file_name
        )));
    }

    let media_type = resolve_media_type(image).ok_or_else(|| {
        RecordError::InvalidInput(format!(
            "could not determine the type of image '{}'",
            image.file_name
        ))
    })?;

    if !ALLOWED_IMAGE_TYPES.contains(&media_type.as_str()) {
        return Err(RecordError::InvalidInput(format!(
            "image type '{media_type}' is not supported (allowed: JPEG, PNG, WebP)"
        )));
    }

    Ok(media_type)
}

fn resolve_media_type(image: &ImageFile) -> Option<String> {
    let declared = image
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != GENERIC_MEDIA_TYPE);

    declared.or_else(|| infer::get(&image.bytes).map(|kind| kind.mime_type().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn image(content_type: Option<&str>, bytes: Vec<u8>) -> ImageFile {
        ImageFile::new("upload.bin", content_type.map(str::to_string), bytes)
    }

    #[test]
    fn test_validate_age_bounds() {
        assert!(validate_age(0).is_ok());
        assert!(validate_age(150).is_ok());
        assert!(matches!(validate_age(151), Err(RecordError::InvalidInput(_))));
    }

    #[test]
    fn test_declared_type_is_accepted() {
        let media = validate_image(&image(Some("image/webp"), vec![1, 2, 3])).unwrap();
        assert_eq!(media, "image/webp");
    }

    #[test]
    fn test_declared_type_parameters_are_ignored() {
        let media = validate_image(&image(Some("Image/JPEG; charset=binary"), vec![1])).unwrap();
        assert_eq!(media, "image/jpeg");
    }

    #[test]
    fn test_missing_type_is_sniffed() {
        let media = validate_image(&image(None, PNG_HEADER.to_vec())).unwrap();
        assert_eq!(media, "image/png");

        let media = validate_image(&image(Some(GENERIC_MEDIA_TYPE), JPEG_HEADER.to_vec())).unwrap();
        assert_eq!(media, "image/jpeg");
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        let err = validate_image(&image(Some("application/pdf"), vec![1, 2])).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_unknown_bytes_are_rejected() {
        assert!(validate_image(&image(None, b"plain text".to_vec())).is_err());
    }

    #[test]
    fn test_oversize_image_is_rejected() {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.resize(MAX_IMAGE_BYTES + 1, 0);
        let err = validate_image(&image(Some("image/png"), bytes)).unwrap_err();
        assert!(err.to_string().contains("5MB"));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(validate_image(&image(Some("image/png"), Vec::new())).is_err());
    }
}
