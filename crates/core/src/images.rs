//! Image hosting.
//!
//! Patient records carry up to two images (a clinical image and a portrait). Both are
//! uploaded to an external image host, which returns a public id and a secure URL that are
//! stored on the record. Uploads are retried with a linear backoff; callers decide whether a
//! final failure is fatal (the record service treats it as a warning).

use crate::constants::{
    CLOUDINARY_API_BASE, CLOUDINARY_DELIVERY_BASE, DEFAULT_OPTIMIZED_WIDTH,
    DEFAULT_UPLOAD_BACKOFF_MS, DEFAULT_UPLOAD_MAX_ATTEMPTS, THUMBNAIL_SIZE,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image host is not configured")]
    NotConfigured,
    #[error("image upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image host returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("malformed image host response: {0}")]
    MalformedResponse(String),
}

pub type ImageResult<T> = std::result::Result<T, ImageError>;

/// An image supplied by the caller, not yet uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    /// Media type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }
}

/// The host's reference to an uploaded image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub public_id: String,
    pub secure_url: String,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Uploads `image` into `folder` on the host.
    async fn upload(&self, image: &ImageFile, folder: &str) -> ImageResult<StoredImage>;
}

/// Image host used when no host credentials are configured. Every upload fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredImageHost;

#[async_trait]
impl ImageHost for UnconfiguredImageHost {
    async fn upload(&self, _image: &ImageFile, _folder: &str) -> ImageResult<StoredImage> {
        Err(ImageError::NotConfigured)
    }
}

/// Cloudinary unsigned-upload client.
#[derive(Clone, Debug)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    api_base: String,
    cloud_name: String,
    upload_preset: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

impl CloudinaryClient {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: CLOUDINARY_API_BASE.to_string(),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
        }
    }

    /// Points the client at a different API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/image/upload", self.api_base, self.cloud_name)
    }

    pub fn optimized_url(&self, public_id: &str, max_width: Option<u32>) -> String {
        optimized_url(&self.cloud_name, public_id, max_width)
    }

    pub fn thumbnail_url(&self, public_id: &str) -> String {
        thumbnail_url(&self.cloud_name, public_id)
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, image: &ImageFile, folder: &str) -> ImageResult<StoredImage> {
        let mut part =
            reqwest::multipart::Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", folder.to_string());

        let response = self.http.post(self.upload_url()).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ImageError::MalformedResponse(e.to_string()))?;

        Ok(StoredImage {
            public_id: body.public_id,
            secure_url: body.secure_url,
        })
    }
}

/// Delivery URL that bounds the width and lets the host pick format and quality.
pub fn optimized_url(cloud_name: &str, public_id: &str, max_width: Option<u32>) -> String {
    let width = max_width.unwrap_or(DEFAULT_OPTIMIZED_WIDTH);
    format!(
        "{CLOUDINARY_DELIVERY_BASE}/{cloud_name}/image/upload/c_limit,w_{width},q_auto,f_auto/{public_id}"
    )
}

/// Face-aware square thumbnail URL.
pub fn thumbnail_url(cloud_name: &str, public_id: &str) -> String {
    format!(
        "{CLOUDINARY_DELIVERY_BASE}/{cloud_name}/image/upload/c_thumb,w_{THUMBNAIL_SIZE},h_{THUMBNAIL_SIZE},g_face/{public_id}"
    )
}

/// Bounded retry with linear backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    unit: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Wait before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_UPLOAD_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_UPLOAD_BACKOFF_MS),
        )
    }
}

/// Uploads `image`, retrying per `policy`.
///
/// Returns the first success, or the error from the last attempt.
pub async fn upload_with_retry(
    host: &dyn ImageHost,
    image: &ImageFile,
    folder: &str,
    policy: &RetryPolicy,
) -> ImageResult<StoredImage> {
    let mut attempt = 1;
    loop {
        match host.upload(image, folder).await {
            Ok(stored) => {
                tracing::info!(attempt, folder, public_id = %stored.public_id, "image uploaded");
                return Ok(stored);
            }
            Err(ImageError::NotConfigured) => return Err(ImageError::NotConfigured),
            Err(e) if attempt < policy.max_attempts() => {
                tracing::warn!(attempt, folder, error = %e, "image upload failed, retrying");
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(attempt, folder, error = %e, "image upload failed, giving up");
                return Err(e);
            }
        }
    }
}
