//! # API REST
//!
//! REST API implementation for MediRx.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Bearer authentication through the configured identity provider
//! - REST-specific concerns (JSON and multipart bodies, CORS, status codes)
//!
//! All record semantics live in `medirx-core`; handlers only translate between the wire
//! types in `api-shared` and core calls.

#![warn(rust_2018_idioms)]

mod convert;
pub mod error;
pub mod extract;

use api_shared::{
    BlockRes, CreatePatientReq, DashboardRes, DoctorRes, ErrorRes, FormattedTreatmentRes,
    HealthRes, HealthService, ImageRes, ListPatientsRes, LoginReq, PatientOutcomeRes,
    PatientRes, PatientUpload, RegisterReq, SessionRes, SpanRes, UpdateDoctorReq,
    UpdatePatientReq, WarningRes,
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use medirx_core::auth::AuthProvider;
use medirx_core::{AuthState, DoctorDirectory, EmailAddress, RecordError, RecordService, Session};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use error::{ApiError, ApiResult};
use extract::{read_patient_form, AuthenticatedDoctor};

/// Two 5 MB images plus the JSON part and multipart framing.
pub const MAX_REQUEST_BYTES: usize = 11 * 1024 * 1024;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    records: RecordService,
    doctors: DoctorDirectory,
    auth: Arc<dyn AuthProvider>,
}

impl AppState {
    pub fn new(records: RecordService, doctors: DoctorDirectory, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            records,
            doctors,
            auth,
        }
    }

    /// A fresh session for one request. Session state is not shared between requests.
    fn session(&self) -> Session {
        Session::new(self.auth.clone(), self.doctors.clone())
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        register,
        login,
        get_me,
        update_me,
        list_patients,
        create_patient,
        get_patient,
        update_patient,
        delete_patient,
        get_treatment,
        list_prescriptions,
        dashboard,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        RegisterReq,
        LoginReq,
        SessionRes,
        DoctorRes,
        UpdateDoctorReq,
        CreatePatientReq,
        UpdatePatientReq,
        PatientUpload,
        ImageRes,
        PatientRes,
        WarningRes,
        PatientOutcomeRes,
        ListPatientsRes,
        DashboardRes,
        SpanRes,
        BlockRes,
        FormattedTreatmentRes,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Builds the REST router with Swagger UI, permissive CORS and the upload body limit.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/doctors/me", get(get_me).put(update_me))
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/patients/:id/treatment", get(get_treatment))
        .route("/prescriptions", get(list_prescriptions))
        .route("/dashboard", get(dashboard))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn session_res(state: AuthState) -> ApiResult<SessionRes> {
    match (state.user, state.doctor) {
        (Some(user), Some(doctor)) => Ok(SessionRes {
            id_token: user.id_token,
            doctor: convert::doctor_res(doctor),
        }),
        _ => Err(RecordError::Unauthenticated.into()),
    }
}

fn parse_email(raw: &str) -> ApiResult<EmailAddress> {
    EmailAddress::parse(raw).map_err(|e| RecordError::from(e).into())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account and profile created", body = SessionRes),
        (status = 400, description = "Invalid input or weak password", body = ErrorRes),
        (status = 409, description = "Email already registered", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Registers a doctor account and its profile, returning a signed-in session.
#[axum::debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> ApiResult<(StatusCode, Json<SessionRes>)> {
    let email = parse_email(&req.email)?;
    let profile = convert::new_doctor(&req)?;

    let auth_state = state
        .session()
        .register(&email, &req.password, profile)
        .await?;
    Ok((StatusCode::CREATED, Json(session_res(auth_state)?)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Signed in", body = SessionRes),
        (status = 401, description = "Invalid email or password", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Signs a doctor in. A missing profile is created with a placeholder name.
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<SessionRes>> {
    let email = parse_email(&req.email)?;
    let auth_state = state.session().login(&email, &req.password).await?;
    Ok(Json(session_res(auth_state)?))
}

#[utoipa::path(
    get,
    path = "/doctors/me",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The signed-in doctor's profile", body = DoctorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 404, description = "No profile exists", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_me(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
) -> ApiResult<Json<DoctorRes>> {
    let auth_state = state.session().identity_changed(Some(identity)).await?;
    let doctor = auth_state.doctor.ok_or(RecordError::DoctorNotFound)?;
    Ok(Json(convert::doctor_res(doctor)))
}

#[utoipa::path(
    put,
    path = "/doctors/me",
    security(("bearer" = [])),
    request_body = UpdateDoctorReq,
    responses(
        (status = 200, description = "Updated profile", body = DoctorRes),
        (status = 400, description = "Invalid input", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 404, description = "No profile exists", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_me(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
    Json(req): Json<UpdateDoctorReq>,
) -> ApiResult<Json<DoctorRes>> {
    let changes = convert::doctor_changes(req)?;
    let session = state.session();
    session.identity_changed(Some(identity)).await?;
    let doctor = session.update_profile(changes).await?;
    Ok(Json(convert::doctor_res(doctor)))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/patients",
    security(("bearer" = [])),
    params(
        ("search" = Option<String>, Query, description = "Case-insensitive name filter")
    ),
    responses(
        (status = 200, description = "The doctor's patients, newest first", body = ListPatientsRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListPatientsRes>> {
    let patients = match query.search.as_deref() {
        Some(term) => state.records.search_patients(&identity.uid, term).await?,
        None => state.records.list_patients(&identity.uid).await?,
    };
    Ok(Json(ListPatientsRes {
        patients: patients.into_iter().map(convert::patient_res).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/patients",
    security(("bearer" = [])),
    request_body(content = PatientUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Patient created; warnings list tolerated failures", body = PatientOutcomeRes),
        (status = 400, description = "Invalid input or image", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 500, description = "Record could not be persisted", body = ErrorRes)
    )
)]
/// Creates a patient. Image upload and diagnosis failures are reported as warnings.
#[axum::debug_handler]
async fn create_patient(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<PatientOutcomeRes>)> {
    let form = read_patient_form::<CreatePatientReq>(multipart).await?;
    let new = convert::new_patient(form.patient)?;

    let outcome = state
        .records
        .add_patient(&identity.uid, new, form.medical_image, form.patient_photo)
        .await?;
    Ok((StatusCode::CREATED, Json(convert::outcome_res(outcome))))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "The patient record", body = PatientRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
    Path(id): Path<String>,
) -> ApiResult<Json<PatientRes>> {
    let patient = state.records.get_patient(&identity.uid, &id).await?;
    Ok(Json(convert::patient_res(patient)))
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Patient id")),
    request_body(content = PatientUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Patient updated", body = PatientOutcomeRes),
        (status = 400, description = "Invalid input or image", body = ErrorRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_patient(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<PatientOutcomeRes>> {
    let form = read_patient_form::<UpdatePatientReq>(multipart).await?;
    let changes = convert::patient_changes(form.patient)?;

    let outcome = state
        .records
        .update_patient(
            &identity.uid,
            &id,
            changes,
            form.medical_image,
            form.patient_photo,
        )
        .await?;
    Ok(Json(convert::outcome_res(outcome)))
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 204, description = "Patient deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn delete_patient(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.records.delete_patient(&identity.uid, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/patients/{id}/treatment",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Treatment plan as display blocks", body = FormattedTreatmentRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_treatment(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
    Path(id): Path<String>,
) -> ApiResult<Json<FormattedTreatmentRes>> {
    let formatted = state.records.formatted_treatment(&identity.uid, &id).await?;
    Ok(Json(convert::formatted_treatment_res(formatted)))
}

#[utoipa::path(
    get,
    path = "/prescriptions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Patients with a diagnosis and treatment", body = ListPatientsRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_prescriptions(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
) -> ApiResult<Json<ListPatientsRes>> {
    let patients = state.records.list_prescriptions(&identity.uid).await?;
    Ok(Json(ListPatientsRes {
        patients: patients.into_iter().map(convert::patient_res).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/dashboard",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Totals for today (UTC) and recent patients", body = DashboardRes),
        (status = 401, description = "Missing or invalid token", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedDoctor(identity): AuthenticatedDoctor,
) -> ApiResult<Json<DashboardRes>> {
    let today = chrono::Utc::now().date_naive();
    let dashboard = state.records.dashboard(&identity.uid, today).await?;
    Ok(Json(convert::dashboard_res(dashboard)))
}
