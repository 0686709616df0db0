use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use medirx_core::auth::FirebaseAuthClient;
use medirx_core::config::{
    cloudinary_settings_from_env_values, non_empty_env_value, retry_policy_from_env_values,
};
use medirx_core::constants::DEFAULT_PATIENT_DATA_DIR;
use medirx_core::diagnosis::{DiagnosisAssistant, GeminiClient};
use medirx_core::images::{CloudinaryClient, ImageHost, UnconfiguredImageHost};
use medirx_core::store::{DocumentStore, FileStore};
use medirx_core::{CoreConfig, DoctorDirectory, RecordService};

/// Main entry point for the MediRx application
///
/// Reads configuration from the environment once, wires the core services and serves the
/// REST API.
///
/// # Environment Variables
/// - `MEDIRX_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PATIENT_DATA_DIR`: Directory for record storage (default: "patient_data")
/// - `GEMINI_API_KEY`: Generation API key (required)
/// - `GEMINI_MODEL`: Generation model override
/// - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_UPLOAD_PRESET`: Image host account; uploads are
///   reported as failed when unset
/// - `FIREBASE_API_KEY`: Identity provider API key (required)
/// - `UPLOAD_MAX_ATTEMPTS`, `UPLOAD_BACKOFF_MS`: Image upload retry policy
///
/// # Errors
/// Returns an error if configuration is missing or invalid, the data directory cannot be
/// created, or the server cannot bind or fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medirx=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = |name: &str| std::env::var(name).ok();

    let rest_addr = env("MEDIRX_REST_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());
    let patient_data_dir = non_empty_env_value(env("PATIENT_DATA_DIR"))
        .unwrap_or_else(|| DEFAULT_PATIENT_DATA_DIR.into());

    let cfg = CoreConfig::new(
        PathBuf::from(patient_data_dir),
        env("GEMINI_API_KEY"),
        env("GEMINI_MODEL"),
        cloudinary_settings_from_env_values(
            env("CLOUDINARY_CLOUD_NAME"),
            env("CLOUDINARY_UPLOAD_PRESET"),
        )?,
        env("FIREBASE_API_KEY"),
        retry_policy_from_env_values(env("UPLOAD_MAX_ATTEMPTS"), env("UPLOAD_BACKOFF_MS"))?,
    )?;
    tracing::info!(?cfg, "configuration loaded");

    tokio::fs::create_dir_all(cfg.patient_data_dir()).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(FileStore::new(cfg.patient_data_dir()));

    let images: Arc<dyn ImageHost> = match cfg.cloudinary() {
        Some(settings) => Arc::new(CloudinaryClient::new(
            settings.cloud_name.clone(),
            settings.upload_preset.clone(),
        )),
        None => {
            tracing::warn!("image host not configured, uploads will be reported as failed");
            Arc::new(UnconfiguredImageHost)
        }
    };

    let generator = GeminiClient::new(cfg.gemini_api_key(), cfg.gemini_model().map(str::to_string));
    let records = RecordService::new(
        store.clone(),
        images,
        DiagnosisAssistant::new(Arc::new(generator)),
        cfg.upload_retry(),
    );
    let doctors = DoctorDirectory::new(store);
    let auth = Arc::new(FirebaseAuthClient::new(cfg.firebase_api_key()));

    let app = router(AppState::new(records, doctors, auth));

    tracing::info!("++ Starting MediRx REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
