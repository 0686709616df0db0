//! Constants used throughout the MediRx core crate.
//!
//! Collection names, storage filenames, upstream endpoints and input limits live here so
//! that services, clients and tests agree on them.

/// Default directory for document storage when no explicit directory is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "patient_data";

/// Collection holding patient records.
pub const PATIENTS_COLLECTION: &str = "patients";

/// Collection holding doctor profiles, keyed by identity uid.
pub const DOCTORS_COLLECTION: &str = "doctors";

/// Filename of a persisted document inside its sharded directory.
pub const DOCUMENT_FILENAME: &str = "document.json";

/// Temporary filename used while a document write is in flight.
pub const DOCUMENT_TMP_FILENAME: &str = "document.json.tmp";

/// Image host folder prefix for clinical images.
pub const MEDICAL_IMAGES_FOLDER: &str = "medical_images";

/// Image host folder prefix for patient portraits.
pub const PATIENT_PHOTOS_FOLDER: &str = "patient_photos";

/// Largest accepted image upload (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Media types accepted for image uploads.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Upper bound on a patient's age in years.
pub const MAX_PATIENT_AGE: u32 = 150;

/// Name given to a doctor profile created lazily at first login.
pub const PLACEHOLDER_DOCTOR_NAME: &str = "Doctor";

/// Number of records shown in the dashboard's recent list.
pub const DASHBOARD_RECENT_LIMIT: usize = 5;

pub const DEFAULT_UPLOAD_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_UPLOAD_BACKOFF_MS: u64 = 1000;

pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";
pub const CLOUDINARY_DELIVERY_BASE: &str = "https://res.cloudinary.com";
pub const DEFAULT_OPTIMIZED_WIDTH: u32 = 800;
pub const THUMBNAIL_SIZE: u32 = 200;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

pub const FIREBASE_AUTH_BASE: &str = "https://identitytoolkit.googleapis.com";
