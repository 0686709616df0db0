//! Doctor profile types.

use crate::store::Write;
use chrono::{DateTime, Utc};
use medirx_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};

/// A doctor's profile, keyed by the identity provider's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: EmailAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile details supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDoctor {
    pub name: NonEmptyText,
    pub specialization: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
    pub phone_number: Option<String>,
}

impl NewDoctor {
    pub fn named(name: NonEmptyText) -> Self {
        Self {
            name,
            specialization: None,
            clinic_name: None,
            clinic_address: None,
            phone_number: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DoctorFields<'a> {
    pub name: &'a str,
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<&'a str>,
}

/// A partial profile update. The email address is owned by the identity provider and
/// cannot be changed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorChanges {
    pub name: Option<NonEmptyText>,
    pub specialization: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
    pub phone_number: Option<String>,
}

impl DoctorChanges {
    pub(crate) fn apply_to(self, mut write: Write) -> Write {
        if let Some(name) = self.name {
            write = write.set("name", name.into_inner());
        }
        if let Some(v) = self.specialization {
            write = write.set("specialization", v);
        }
        if let Some(v) = self.clinic_name {
            write = write.set("clinicName", v);
        }
        if let Some(v) = self.clinic_address {
            write = write.set("clinicAddress", v);
        }
        if let Some(v) = self.phone_number {
            write = write.set("phoneNumber", v);
        }
        write
    }

    /// Applies the same changes to an in-memory profile.
    pub fn merge_into(&self, doctor: &mut Doctor) {
        if let Some(name) = &self.name {
            doctor.name = name.as_str().to_string();
        }
        if let Some(v) = &self.specialization {
            doctor.specialization = Some(v.clone());
        }
        if let Some(v) = &self.clinic_name {
            doctor.clinic_name = Some(v.clone());
        }
        if let Some(v) = &self.clinic_address {
            doctor.clinic_address = Some(v.clone());
        }
        if let Some(v) = &self.phone_number {
            doctor.phone_number = Some(v.clone());
        }
    }
}
