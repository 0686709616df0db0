//! Patient record management.
//!
//! [`RecordService`] owns the patient record workflows. Every operation is scoped to the
//! requesting doctor: a record owned by someone else behaves exactly like a missing one.
//!
//! ## Create workflow
//!
//! ```text
//! validate -> upload medical image -> upload patient photo -> generate diagnosis -> persist -> re-read
//! ```
//!
//! Uploads are skipped when no file is supplied. Upload and generation failures are
//! tolerated and reported as [`RecordWarning`]s; only the persistence step can fail the
//! operation, and in that case nothing is left visible to later reads.

use crate::constants::{
    DASHBOARD_RECENT_LIMIT, MEDICAL_IMAGES_FOLDER, PATIENTS_COLLECTION, PATIENT_PHOTOS_FOLDER,
};
use crate::diagnosis::DiagnosisAssistant;
use crate::images::{upload_with_retry, ImageFile, ImageHost, RetryPolicy, StoredImage};
use crate::markdown::FormattedTreatment;
use crate::patient::{NewPatient, Patient, PatientChanges, PatientFields};
use crate::store::{DocumentStore, StoreError, StoredDocument, Write};
use crate::validation::{validate_image, validate_new_patient, validate_patient_changes};
use crate::{RecordError, RecordResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A non-fatal problem encountered while completing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordWarning {
    MedicalImageUploadFailed,
    PatientPhotoUploadFailed,
    DiagnosisFallbackUsed,
}

impl RecordWarning {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RecordWarning::MedicalImageUploadFailed => "medical_image_upload_failed",
            RecordWarning::PatientPhotoUploadFailed => "patient_photo_upload_failed",
            RecordWarning::DiagnosisFallbackUsed => "diagnosis_fallback_used",
        }
    }
}

impl std::fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RecordWarning::MedicalImageUploadFailed => {
                "The medical image could not be uploaded; the record was saved without it"
            }
            RecordWarning::PatientPhotoUploadFailed => {
                "The patient photo could not be uploaded; the record was saved without it"
            }
            RecordWarning::DiagnosisFallbackUsed => {
                "AI diagnosis was unavailable; a generic assessment was saved and should be reviewed"
            }
        })
    }
}

/// A successful result plus any warnings raised on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<RecordWarning>,
}

/// Summary figures for a doctor's home screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub total_patients: usize,
    pub patients_today: usize,
    pub recent: Vec<Patient>,
}

/// Patient record operations - no API concerns.
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn DocumentStore>,
    images: Arc<dyn ImageHost>,
    assistant: DiagnosisAssistant,
    retry: RetryPolicy,
}

#[derive(Clone, Copy)]
enum ImageSlot {
    Medical,
    Photo,
}

impl ImageSlot {
    fn folder(&self, doctor_id: &str) -> String {
        match self {
            ImageSlot::Medical => format!("{MEDICAL_IMAGES_FOLDER}/{doctor_id}"),
            ImageSlot::Photo => format!("{PATIENT_PHOTOS_FOLDER}/{doctor_id}"),
        }
    }

    fn warning(&self) -> RecordWarning {
        match self {
            ImageSlot::Medical => RecordWarning::MedicalImageUploadFailed,
            ImageSlot::Photo => RecordWarning::PatientPhotoUploadFailed,
        }
    }

    fn fields(&self) -> (&'static str, &'static str) {
        match self {
            ImageSlot::Medical => ("imageUrl", "imagePublicId"),
            ImageSlot::Photo => ("patientImageUrl", "patientImagePublicId"),
        }
    }
}

impl RecordService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        images: Arc<dyn ImageHost>,
        assistant: DiagnosisAssistant,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            images,
            assistant,
            retry,
        }
    }

    /// Creates a patient record.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidInput` if the input or an image fails validation (before
    /// any network call), `RecordError::Unauthenticated` if `doctor_id` is empty, and
    /// `RecordError::CreateFailed` if the record could not be persisted.
    pub async fn add_patient(
        &self,
        doctor_id: &str,
        new: NewPatient,
        medical_image: Option<ImageFile>,
        patient_photo: Option<ImageFile>,
    ) -> RecordResult<Outcome<Patient>> {
        require_doctor(doctor_id)?;
        validate_new_patient(&new)?;
        validate_images(&medical_image, &patient_photo)?;

        let mut warnings = Vec::new();

        let medical = self
            .upload(doctor_id, ImageSlot::Medical, medical_image.as_ref(), &mut warnings)
            .await;
        let photo = self
            .upload(doctor_id, ImageSlot::Photo, patient_photo.as_ref(), &mut warnings)
            .await;

        let assessment = self
            .assistant
            .generate(
                new.symptoms.as_str(),
                new.diagnosis_description.as_str(),
                new.age,
                new.sex,
            )
            .await;
        if assessment.is_fallback() {
            warnings.push(RecordWarning::DiagnosisFallbackUsed);
        }

        let fields = PatientFields {
            doctor_id,
            name: new.name.as_str(),
            age: new.age,
            sex: new.sex,
            address: new.address.as_deref().map(str::trim).filter(|a| !a.is_empty()),
            symptoms: new.symptoms.as_str(),
            diagnosis_description: new.diagnosis_description.as_str(),
            diagnosis: &assessment.diagnosis,
            treatment: &assessment.treatment,
            image_url: medical.as_ref().map_or("", |i| i.secure_url.as_str()),
            image_public_id: medical.as_ref().map_or("", |i| i.public_id.as_str()),
            patient_image_url: photo.as_ref().map_or("", |i| i.secure_url.as_str()),
            patient_image_public_id: photo.as_ref().map_or("", |i| i.public_id.as_str()),
        };
        let write = Write::from_serializable(&fields)
            .map_err(RecordError::CreateFailed)?
            .with_server_timestamp("createdAt")
            .with_server_timestamp("updatedAt");

        let patient_id = self
            .store
            .create(PATIENTS_COLLECTION, write)
            .await
            .map_err(|e| {
                tracing::error!(doctor_id, error = %e, "failed to persist patient record");
                RecordError::CreateFailed(e)
            })?;

        let patient = match self.read_back(&patient_id).await {
            Ok(patient) => patient,
            Err(read_error) => {
                tracing::error!(
                    patient_id = %patient_id,
                    error = %read_error,
                    "created patient record could not be read back, removing it"
                );
                if let Err(cleanup_error) =
                    self.store.delete(PATIENTS_COLLECTION, &patient_id).await
                {
                    return Err(RecordError::CleanupAfterCreateFailed {
                        id: patient_id,
                        read_error: Box::new(read_error),
                        cleanup_error,
                    });
                }
                return Err(read_error);
            }
        };

        tracing::info!(
            patient_id = %patient.id,
            doctor_id,
            warnings = warnings.len(),
            "patient record created"
        );
        Ok(Outcome {
            value: patient,
            warnings,
        })
    }

    /// Applies a partial update. Image pairs that are not resupplied keep their stored value.
    pub async fn update_patient(
        &self,
        doctor_id: &str,
        patient_id: &str,
        changes: PatientChanges,
        medical_image: Option<ImageFile>,
        patient_photo: Option<ImageFile>,
    ) -> RecordResult<Outcome<Patient>> {
        require_doctor(doctor_id)?;
        validate_patient_changes(&changes)?;
        validate_images(&medical_image, &patient_photo)?;

        self.get_patient(doctor_id, patient_id).await?;

        let mut warnings = Vec::new();
        let mut write = changes.apply_to(Write::default());

        for (slot, image) in [
            (ImageSlot::Medical, medical_image.as_ref()),
            (ImageSlot::Photo, patient_photo.as_ref()),
        ] {
            if let Some(stored) = self.upload(doctor_id, slot, image, &mut warnings).await {
                let (url_field, id_field) = slot.fields();
                write = write
                    .set(url_field, stored.secure_url)
                    .set(id_field, stored.public_id);
            }
        }

        let write = write.with_server_timestamp("updatedAt");
        self.store
            .update(PATIENTS_COLLECTION, patient_id, write)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => RecordError::PatientNotFound,
                other => {
                    tracing::error!(patient_id, error = %other, "failed to update patient record");
                    RecordError::UpdateFailed(other)
                }
            })?;

        let patient = self.read_back(patient_id).await?;
        tracing::info!(patient_id, doctor_id, "patient record updated");
        Ok(Outcome {
            value: patient,
            warnings,
        })
    }

    /// # Errors
    ///
    /// Returns `RecordError::PatientNotFound` if the record does not exist or belongs to
    /// another doctor.
    pub async fn get_patient(&self, doctor_id: &str, patient_id: &str) -> RecordResult<Patient> {
        require_doctor(doctor_id)?;
        let doc = self
            .store
            .get(PATIENTS_COLLECTION, patient_id)
            .await
            .map_err(map_read_error)?
            .ok_or(RecordError::PatientNotFound)?;

        let patient: Patient = doc.decode()?;
        if patient.doctor_id != doctor_id {
            tracing::warn!(patient_id, doctor_id, "patient record requested by non-owner");
            return Err(RecordError::PatientNotFound);
        }
        Ok(patient)
    }

    /// Deletes a patient record. Hosted images are left in place.
    pub async fn delete_patient(&self, doctor_id: &str, patient_id: &str) -> RecordResult<()> {
        self.get_patient(doctor_id, patient_id).await?;

        self.store
            .delete(PATIENTS_COLLECTION, patient_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => RecordError::PatientNotFound,
                other => RecordError::Store(other),
            })?;

        tracing::info!(patient_id, doctor_id, "patient record deleted");
        Ok(())
    }

    /// Lists the doctor's patients, newest first.
    pub async fn list_patients(&self, doctor_id: &str) -> RecordResult<Vec<Patient>> {
        require_doctor(doctor_id)?;
        let docs = self
            .store
            .query_eq_desc(PATIENTS_COLLECTION, "doctorId", doctor_id, "createdAt")
            .await?;

        Ok(docs.iter().filter_map(decode_or_skip).collect())
    }

    /// Case-insensitive substring match on patient name over the doctor's list.
    ///
    /// A blank term returns the full list. Otherwise the term is matched as given, surrounding
    /// whitespace included.
    pub async fn search_patients(&self, doctor_id: &str, term: &str) -> RecordResult<Vec<Patient>> {
        let patients = self.list_patients(doctor_id).await?;
        if term.trim().is_empty() {
            return Ok(patients);
        }

        let needle = term.to_lowercase();
        Ok(patients
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Patients with both a diagnosis and a treatment plan recorded.
    pub async fn list_prescriptions(&self, doctor_id: &str) -> RecordResult<Vec<Patient>> {
        Ok(self
            .list_patients(doctor_id)
            .await?
            .into_iter()
            .filter(Patient::has_prescription)
            .collect())
    }

    /// Totals for `today` (a UTC date) and the most recent records.
    pub async fn dashboard(&self, doctor_id: &str, today: NaiveDate) -> RecordResult<Dashboard> {
        let patients = self.list_patients(doctor_id).await?;
        let patients_today = patients
            .iter()
            .filter(|p| p.created_at.date_naive() == today)
            .count();

        Ok(Dashboard {
            total_patients: patients.len(),
            patients_today,
            recent: patients.into_iter().take(DASHBOARD_RECENT_LIMIT).collect(),
        })
    }

    /// The patient's treatment plan, formatted for display.
    pub async fn formatted_treatment(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> RecordResult<FormattedTreatment> {
        let patient = self.get_patient(doctor_id, patient_id).await?;
        Ok(FormattedTreatment::from_text(&patient.treatment))
    }

    async fn upload(
        &self,
        doctor_id: &str,
        slot: ImageSlot,
        image: Option<&ImageFile>,
        warnings: &mut Vec<RecordWarning>,
    ) -> Option<StoredImage> {
        let image = image?;
        let folder = slot.folder(doctor_id);
        match upload_with_retry(self.images.as_ref(), image, &folder, &self.retry).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!(doctor_id, folder = %folder, error = %e, "image upload abandoned");
                warnings.push(slot.warning());
                None
            }
        }
    }

    async fn read_back(&self, patient_id: &str) -> RecordResult<Patient> {
        let doc = self
            .store
            .get(PATIENTS_COLLECTION, patient_id)
            .await?
            .ok_or_else(|| {
                RecordError::Store(StoreError::NotFound {
                    collection: PATIENTS_COLLECTION.to_string(),
                    id: patient_id.to_string(),
                })
            })?;
        Ok(doc.decode()?)
    }
}

fn require_doctor(doctor_id: &str) -> RecordResult<()> {
    if doctor_id.trim().is_empty() {
        return Err(RecordError::Unauthenticated);
    }
    Ok(())
}

fn validate_images(
    medical_image: &Option<ImageFile>,
    patient_photo: &Option<ImageFile>,
) -> RecordResult<()> {
    for image in medical_image.iter().chain(patient_photo.iter()) {
        validate_image(image)?;
    }
    Ok(())
}

fn map_read_error(e: StoreError) -> RecordError {
    match e {
        StoreError::InvalidId(_) => RecordError::PatientNotFound,
        other => RecordError::Store(other),
    }
}

fn decode_or_skip(doc: &StoredDocument) -> Option<Patient> {
    match doc.decode() {
        Ok(patient) => Some(patient),
        Err(e) => {
            tracing::warn!(patient_id = %doc.id, error = %e, "skipping undecodable patient record");
            None
        }
    }
}
