//! Patient record types.
//!
//! A [`Patient`] is the stored record as read back from the document store. Its persisted
//! field names are camelCase, and the two image references are stored as flat
//! `(url, public id)` string pairs that are empty when no image is attached.
//! [`NewPatient`] and [`PatientChanges`] are the validated inputs for create and update.

use crate::images::StoredImage;
use crate::store::Write;
use chrono::{DateTime, Utc};
use medirx_types::{NonEmptyText, Sex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub doctor_id: String,
    pub name: String,
    pub age: u32,
    pub sex: Sex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub symptoms: String,
    pub diagnosis_description: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_public_id: String,
    #[serde(default)]
    pub patient_image_url: String,
    #[serde(default)]
    pub patient_image_public_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An image attached to a patient record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub url: String,
    pub public_id: String,
}

impl From<StoredImage> for ImageAttachment {
    fn from(image: StoredImage) -> Self {
        Self {
            url: image.secure_url,
            public_id: image.public_id,
        }
    }
}

fn attachment(url: &str, public_id: &str) -> Option<ImageAttachment> {
    if url.is_empty() {
        return None;
    }
    Some(ImageAttachment {
        url: url.to_string(),
        public_id: public_id.to_string(),
    })
}

impl Patient {
    pub fn medical_image(&self) -> Option<ImageAttachment> {
        attachment(&self.image_url, &self.image_public_id)
    }

    pub fn patient_photo(&self) -> Option<ImageAttachment> {
        attachment(&self.patient_image_url, &self.patient_image_public_id)
    }

    /// True once both a diagnosis and a treatment plan are recorded.
    pub fn has_prescription(&self) -> bool {
        !self.diagnosis.trim().is_empty() && !self.treatment.trim().is_empty()
    }
}

/// Input for a new patient record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub name: NonEmptyText,
    pub age: u32,
    pub sex: Sex,
    pub address: Option<String>,
    pub symptoms: NonEmptyText,
    pub diagnosis_description: NonEmptyText,
}

/// Field values written when a patient record is created. Timestamps are added by the store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PatientFields<'a> {
    pub doctor_id: &'a str,
    pub name: &'a str,
    pub age: u32,
    pub sex: Sex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<&'a str>,
    pub symptoms: &'a str,
    pub diagnosis_description: &'a str,
    pub diagnosis: &'a str,
    pub treatment: &'a str,
    pub image_url: &'a str,
    pub image_public_id: &'a str,
    pub patient_image_url: &'a str,
    pub patient_image_public_id: &'a str,
}

/// A partial update. Fields left as `None` are not written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientChanges {
    pub name: Option<NonEmptyText>,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub address: Option<String>,
    pub symptoms: Option<NonEmptyText>,
    pub diagnosis_description: Option<NonEmptyText>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
}

impl PatientChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to(self, mut write: Write) -> Write {
        if let Some(name) = self.name {
            write = write.set("name", name.into_inner());
        }
        if let Some(age) = self.age {
            write = write.set("age", age);
        }
        if let Some(sex) = self.sex {
            write = write.set("sex", sex.as_str());
        }
        if let Some(address) = self.address {
            // A blank address clears the stored one, matching create which omits it.
            let address = address.trim();
            write = if address.is_empty() {
                write.set("address", serde_json::Value::Null)
            } else {
                write.set("address", address)
            };
        }
        if let Some(symptoms) = self.symptoms {
            write = write.set("symptoms", symptoms.into_inner());
        }
        if let Some(description) = self.diagnosis_description {
            write = write.set("diagnosisDescription", description.into_inner());
        }
        if let Some(diagnosis) = self.diagnosis {
            write = write.set("diagnosis", diagnosis);
        }
        if let Some(treatment) = self.treatment {
            write = write.set("treatment", treatment);
        }
        write
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored_patient() -> serde_json::Value {
        json!({
            "id": "abcd1234",
            "doctorId": "doc1",
            "name": "John Doe",
            "age": 42,
            "sex": "Male",
            "symptoms": "cough",
            "diagnosisDescription": "bronchitis?",
            "diagnosis": "",
            "treatment": "",
            "imageUrl": "https://img.test/a",
            "imagePublicId": "medical_images/doc1/a",
            "patientImageUrl": "",
            "patientImagePublicId": "",
            "createdAt": "2026-03-01T09:15:00.000000Z",
            "updatedAt": "2026-03-01T09:15:00.000000Z"
        })
    }

    #[test]
    fn test_patient_decodes_camel_case_fields() {
        let patient: Patient = serde_json::from_value(stored_patient()).unwrap();
        assert_eq!(patient.doctor_id, "doc1");
        assert_eq!(patient.diagnosis_description, "bronchitis?");
        assert_eq!(patient.address, None);
    }

    #[test]
    fn test_image_accessors() {
        let patient: Patient = serde_json::from_value(stored_patient()).unwrap();
        assert_eq!(
            patient.medical_image(),
            Some(ImageAttachment {
                url: "https://img.test/a".into(),
                public_id: "medical_images/doc1/a".into(),
            })
        );
        assert_eq!(patient.patient_photo(), None);
        assert!(!patient.has_prescription());
    }

    #[test]
    fn test_changes_write_only_supplied_fields() {
        let changes = PatientChanges {
            diagnosis: Some("Asthma".into()),
            age: Some(43),
            ..Default::default()
        };
        let write = changes.apply_to(Write::default());

        assert_eq!(write.fields().len(), 2);
        assert_eq!(write.fields()["diagnosis"], json!("Asthma"));
        assert_eq!(write.fields()["age"], json!(43));
    }

    #[test]
    fn test_changes_normalise_address() {
        let padded = PatientChanges {
            address: Some("  12 Quay St ".into()),
            ..Default::default()
        };
        let write = padded.apply_to(Write::default());
        assert_eq!(write.fields()["address"], json!("12 Quay St"));

        let blank = PatientChanges {
            address: Some("   ".into()),
            ..Default::default()
        };
        let write = blank.apply_to(Write::default());
        assert_eq!(write.fields()["address"], serde_json::Value::Null);
    }

    #[test]
    fn test_empty_changes() {
        assert!(PatientChanges::default().is_empty());
    }
}
