//! Doctor profile storage.
//!
//! Profiles live in the `doctors` collection under the identity provider's user id, so a
//! signed-in identity maps directly to its profile document.

use crate::constants::{DOCTORS_COLLECTION, PLACEHOLDER_DOCTOR_NAME};
use crate::doctor::{Doctor, DoctorChanges, DoctorFields, NewDoctor};
use crate::store::{DocumentStore, StoreError, Write};
use crate::{RecordError, RecordResult};
use medirx_types::EmailAddress;
use std::sync::Arc;

#[derive(Clone)]
pub struct DoctorDirectory {
    store: Arc<dyn DocumentStore>,
}

impl DoctorDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, doctor_id: &str) -> RecordResult<Option<Doctor>> {
        let doc = match self.store.get(DOCTORS_COLLECTION, doctor_id).await {
            Ok(doc) => doc,
            Err(StoreError::InvalidId(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        doc.map(|d| d.decode()).transpose().map_err(Into::into)
    }

    /// Writes a new profile for `doctor_id` and returns it as stored.
    pub async fn create(
        &self,
        doctor_id: &str,
        email: &EmailAddress,
        new: NewDoctor,
    ) -> RecordResult<Doctor> {
        let fields = DoctorFields {
            name: new.name.as_str(),
            email: email.as_str(),
            specialization: new.specialization.as_deref(),
            clinic_name: new.clinic_name.as_deref(),
            clinic_address: new.clinic_address.as_deref(),
            phone_number: new.phone_number.as_deref(),
        };
        let write = Write::from_serializable(&fields)?.with_server_timestamp("createdAt");
        self.store.set(DOCTORS_COLLECTION, doctor_id, write).await?;

        tracing::info!(doctor_id, "doctor profile created");
        self.get(doctor_id).await?.ok_or(RecordError::DoctorNotFound)
    }

    /// Returns the profile for `doctor_id`, creating a placeholder if none exists.
    pub async fn ensure_profile(
        &self,
        doctor_id: &str,
        email: &EmailAddress,
    ) -> RecordResult<Doctor> {
        if let Some(doctor) = self.get(doctor_id).await? {
            return Ok(doctor);
        }

        tracing::info!(doctor_id, "no doctor profile found, creating placeholder");
        let name = medirx_types::NonEmptyText::new(PLACEHOLDER_DOCTOR_NAME)?;
        self.create(doctor_id, email, NewDoctor::named(name)).await
    }

    /// Merges `changes` into the stored profile.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::DoctorNotFound` if no profile exists.
    pub async fn update(&self, doctor_id: &str, changes: DoctorChanges) -> RecordResult<Doctor> {
        let write = changes
            .apply_to(Write::default())
            .with_server_timestamp("updatedAt");

        self.store
            .update(DOCTORS_COLLECTION, doctor_id, write)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } | StoreError::InvalidId(_) => {
                    RecordError::DoctorNotFound
                }
                other => RecordError::Store(other),
            })?;

        tracing::info!(doctor_id, "doctor profile updated");
        self.get(doctor_id).await?.ok_or(RecordError::DoctorNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use medirx_types::NonEmptyText;
    use tempfile::TempDir;

    fn directory(temp_dir: &TempDir) -> DoctorDirectory {
        DoctorDirectory::new(Arc::new(FileStore::new(temp_dir.path())))
    }

    fn email() -> EmailAddress {
        EmailAddress::parse("gp@clinic.test").unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_profile() {
        let temp_dir = TempDir::new().unwrap();
        let doctors = directory(&temp_dir);
        let new = NewDoctor {
            clinic_name: Some("Riverside Practice".into()),
            ..NewDoctor::named(NonEmptyText::new("Dr Ada Lovelace").unwrap())
        };

        let created = doctors.create("uidAda01", &email(), new).await.unwrap();

        assert_eq!(created.id, "uidAda01");
        assert_eq!(created.name, "Dr Ada Lovelace");
        assert_eq!(created.clinic_name.as_deref(), Some("Riverside Practice"));
        assert_eq!(created.updated_at, None);
        assert_eq!(doctors.get("uidAda01").await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_ensure_profile_creates_placeholder_once() {
        let temp_dir = TempDir::new().unwrap();
        let doctors = directory(&temp_dir);

        let first = doctors.ensure_profile("uidNew01", &email()).await.unwrap();
        assert_eq!(first.name, "Doctor");
        assert_eq!(first.email, email());

        let second = doctors.ensure_profile("uidNew01", &email()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_update_merges_profile() {
        let temp_dir = TempDir::new().unwrap();
        let doctors = directory(&temp_dir);
        doctors.ensure_profile("uidUpd01", &email()).await.unwrap();

        let updated = doctors
            .update(
                "uidUpd01",
                DoctorChanges {
                    specialization: Some("General Practice".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Doctor");
        assert_eq!(updated.specialization.as_deref(), Some("General Practice"));
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_profile() {
        let temp_dir = TempDir::new().unwrap();
        let doctors = directory(&temp_dir);

        let err = doctors
            .update("uidNone1", DoctorChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::DoctorNotFound));
    }
}
