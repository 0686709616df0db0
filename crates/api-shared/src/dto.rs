//! Request and response bodies for the MediRx API.
//!
//! Timestamps are RFC 3339 strings. Optional profile and patient fields are omitted from
//! responses when unset.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegisterReq {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub clinic_address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

/// A signed-in session: the bearer token for later requests and the doctor's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionRes {
    pub id_token: String,
    pub doctor: DoctorRes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DoctorRes {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Profile changes. The email address cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateDoctorReq {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub clinic_address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// The `patient` part of a create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreatePatientReq {
    pub name: String,
    pub age: u32,
    /// `Male`, `Female` or `Other` (case-insensitive).
    pub sex: String,
    #[serde(default)]
    pub address: Option<String>,
    pub symptoms: String,
    pub diagnosis_description: String,
}

/// The `patient` part of an update request. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdatePatientReq {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub diagnosis_description: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
}

/// Multipart body accepted by the create and update endpoints (documentation only).
#[derive(Debug, ToSchema)]
pub struct PatientUpload {
    /// JSON-encoded `CreatePatientReq` or `UpdatePatientReq`.
    pub patient: String,
    #[schema(value_type = Option<String>, format = Binary)]
    pub medical_image: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub patient_photo: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageRes {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub id: String,
    pub doctor_id: String,
    pub name: String,
    pub age: u32,
    pub sex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub symptoms: String,
    pub diagnosis_description: String,
    pub diagnosis: String,
    pub treatment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_image: Option<ImageRes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_photo: Option<ImageRes>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WarningRes {
    pub code: String,
    pub message: String,
}

/// A created or updated patient plus any non-fatal warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientOutcomeRes {
    pub patient: PatientRes,
    pub warnings: Vec<WarningRes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardRes {
    pub total_patients: usize,
    pub patients_today: usize,
    pub recent: Vec<PatientRes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpanRes {
    /// `plain` or `bold`.
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BlockRes {
    /// `paragraph`, `list_item` or `line_break`.
    pub kind: String,
    #[serde(default)]
    pub spans: Vec<SpanRes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FormattedTreatmentRes {
    /// `list` or `plain`.
    pub container: String,
    pub blocks: Vec<BlockRes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_patient_req_defaults_missing_fields() {
        let req: UpdatePatientReq = serde_json::from_str(r#"{"diagnosis":"Asthma"}"#).unwrap();
        assert_eq!(req.diagnosis.as_deref(), Some("Asthma"));
        assert_eq!(req.name, None);
        assert_eq!(req.age, None);
    }

    #[test]
    fn test_patient_res_omits_absent_images() {
        let res = PatientRes {
            id: "p1".into(),
            doctor_id: "d1".into(),
            name: "John Doe".into(),
            age: 42,
            sex: "Male".into(),
            address: None,
            symptoms: "cough".into(),
            diagnosis_description: "bronchitis".into(),
            diagnosis: String::new(),
            treatment: String::new(),
            medical_image: None,
            patient_photo: None,
            created_at: "2026-03-01T09:15:00.000000Z".into(),
            updated_at: "2026-03-01T09:15:00.000000Z".into(),
        };
        let json = serde_json::to_value(&res).unwrap();
        assert!(json.get("medical_image").is_none());
        assert!(json.get("address").is_none());
        assert_eq!(json["doctor_id"], "d1");
    }
}
