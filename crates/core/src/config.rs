//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Environment variables are never read during request handling; the helpers here take the
//! raw optional values so the binary can read the environment and tests can pass values in
//! directly.

use crate::constants::{DEFAULT_UPLOAD_BACKOFF_MS, DEFAULT_UPLOAD_MAX_ATTEMPTS};
use crate::images::RetryPolicy;
use crate::{RecordError, RecordResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Image host account used for unsigned uploads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub upload_preset: String,
}

/// Core configuration resolved at startup.
#[derive(Clone)]
pub struct CoreConfig {
    patient_data_dir: PathBuf,
    gemini_api_key: String,
    gemini_model: Option<String>,
    cloudinary: Option<CloudinarySettings>,
    firebase_api_key: String,
    upload_retry: RetryPolicy,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("patient_data_dir", &self.patient_data_dir)
            .field("gemini_model", &self.gemini_model)
            .field("cloudinary", &self.cloudinary)
            .field("upload_retry", &self.upload_retry)
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Config` if the generation API key or the identity provider API
    /// key is missing.
    pub fn new(
        patient_data_dir: PathBuf,
        gemini_api_key: Option<String>,
        gemini_model: Option<String>,
        cloudinary: Option<CloudinarySettings>,
        firebase_api_key: Option<String>,
        upload_retry: RetryPolicy,
    ) -> RecordResult<Self> {
        let gemini_api_key = required("GEMINI_API_KEY", gemini_api_key)?;
        let firebase_api_key = required("FIREBASE_API_KEY", firebase_api_key)?;

        Ok(Self {
            patient_data_dir,
            gemini_api_key,
            gemini_model: non_empty_env_value(gemini_model),
            cloudinary,
            firebase_api_key,
            upload_retry,
        })
    }

    pub fn patient_data_dir(&self) -> &Path {
        &self.patient_data_dir
    }

    pub fn gemini_api_key(&self) -> &str {
        &self.gemini_api_key
    }

    pub fn gemini_model(&self) -> Option<&str> {
        self.gemini_model.as_deref()
    }

    pub fn cloudinary(&self) -> Option<&CloudinarySettings> {
        self.cloudinary.as_ref()
    }

    pub fn firebase_api_key(&self) -> &str {
        &self.firebase_api_key
    }

    pub fn upload_retry(&self) -> RetryPolicy {
        self.upload_retry
    }
}

fn required(name: &str, value: Option<String>) -> RecordResult<String> {
    non_empty_env_value(value).ok_or_else(|| RecordError::Config(format!("{name} must be set")))
}

/// Trims a raw environment value, treating empty or whitespace-only values as unset.
pub fn non_empty_env_value(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds image host settings. Both values must be set, or neither.
pub fn cloudinary_settings_from_env_values(
    cloud_name: Option<String>,
    upload_preset: Option<String>,
) -> RecordResult<Option<CloudinarySettings>> {
    match (non_empty_env_value(cloud_name), non_empty_env_value(upload_preset)) {
        (Some(cloud_name), Some(upload_preset)) => Ok(Some(CloudinarySettings {
            cloud_name,
            upload_preset,
        })),
        (None, None) => Ok(None),
        _ => Err(RecordError::Config(
            "CLOUDINARY_CLOUD_NAME and CLOUDINARY_UPLOAD_PRESET must be set together".into(),
        )),
    }
}

/// Parses the upload retry policy from optional string values, falling back to defaults.
pub fn retry_policy_from_env_values(
    max_attempts: Option<String>,
    backoff_ms: Option<String>,
) -> RecordResult<RetryPolicy> {
    let max_attempts = match non_empty_env_value(max_attempts) {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                RecordError::Config(format!(
                    "UPLOAD_MAX_ATTEMPTS must be a positive integer, got '{raw}'"
                ))
            })?,
        None => DEFAULT_UPLOAD_MAX_ATTEMPTS,
    };

    let backoff_ms = match non_empty_env_value(backoff_ms) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            RecordError::Config(format!(
                "UPLOAD_BACKOFF_MS must be a non-negative integer, got '{raw}'"
            ))
        })?,
        None => DEFAULT_UPLOAD_BACKOFF_MS,
    };

    Ok(RetryPolicy::new(max_attempts, Duration::from_millis(backoff_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_missing_gemini_key_is_a_config_error() {
        let err = CoreConfig::new(
            PathBuf::from("patient_data"),
            some("   "),
            None,
            None,
            some("fb-key"),
            RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::Config(_)));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_missing_firebase_key_is_a_config_error() {
        let err = CoreConfig::new(
            PathBuf::from("patient_data"),
            some("g-key"),
            None,
            None,
            None,
            RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("FIREBASE_API_KEY"));
    }

    #[test]
    fn test_debug_output_hides_keys() {
        let cfg = CoreConfig::new(
            PathBuf::from("patient_data"),
            some("g-secret"),
            some(" gemini-1.5-pro "),
            None,
            some("fb-secret"),
            RetryPolicy::default(),
        )
        .unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("g-secret"));
        assert!(!debug.contains("fb-secret"));
        assert_eq!(cfg.gemini_model(), Some("gemini-1.5-pro"));
    }

    #[test]
    fn test_cloudinary_settings_must_be_paired() {
        assert_eq!(cloudinary_settings_from_env_values(None, None).unwrap(), None);
        assert!(cloudinary_settings_from_env_values(some("demo"), None).is_err());
        let settings = cloudinary_settings_from_env_values(some("demo"), some("unsigned"))
            .unwrap()
            .unwrap();
        assert_eq!(settings.cloud_name, "demo");
    }

    #[test]
    fn test_retry_policy_from_env_values() {
        let policy = retry_policy_from_env_values(None, None).unwrap();
        assert_eq!(policy, RetryPolicy::default());

        let policy = retry_policy_from_env_values(some("5"), some("250")).unwrap();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.unit(), Duration::from_millis(250));

        assert!(retry_policy_from_env_values(some("0"), None).is_err());
        assert!(retry_policy_from_env_values(None, some("-1")).is_err());
    }
}
