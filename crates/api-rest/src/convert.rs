//! Conversions between API DTOs and core types.

use api_shared::{
    BlockRes, CreatePatientReq, DashboardRes, DoctorRes, FormattedTreatmentRes, ImageRes,
    PatientOutcomeRes, PatientRes, RegisterReq, SpanRes, UpdateDoctorReq, UpdatePatientReq,
    WarningRes,
};
use medirx_core::doctor::{Doctor, DoctorChanges, NewDoctor};
use medirx_core::markdown::{Block, Container, FormattedTreatment, Span};
use medirx_core::patient::{ImageAttachment, NewPatient, Patient, PatientChanges};
use medirx_core::store::format_timestamp;
use medirx_core::{Dashboard, NonEmptyText, Outcome, RecordResult, RecordWarning, Sex};

pub fn new_patient(req: CreatePatientReq) -> RecordResult<NewPatient> {
    Ok(NewPatient {
        name: NonEmptyText::new(&req.name)?,
        age: req.age,
        sex: req.sex.parse::<Sex>()?,
        address: req.address,
        symptoms: NonEmptyText::new(&req.symptoms)?,
        diagnosis_description: NonEmptyText::new(&req.diagnosis_description)?,
    })
}

pub fn patient_changes(req: UpdatePatientReq) -> RecordResult<PatientChanges> {
    Ok(PatientChanges {
        name: req.name.map(NonEmptyText::new).transpose()?,
        age: req.age,
        sex: req.sex.map(|s| s.parse::<Sex>()).transpose()?,
        address: req.address,
        symptoms: req.symptoms.map(NonEmptyText::new).transpose()?,
        diagnosis_description: req.diagnosis_description.map(NonEmptyText::new).transpose()?,
        diagnosis: req.diagnosis,
        treatment: req.treatment,
    })
}

pub fn new_doctor(req: &RegisterReq) -> RecordResult<NewDoctor> {
    Ok(NewDoctor {
        name: NonEmptyText::new(&req.name)?,
        specialization: req.specialization.clone(),
        clinic_name: req.clinic_name.clone(),
        clinic_address: req.clinic_address.clone(),
        phone_number: req.phone_number.clone(),
    })
}

pub fn doctor_changes(req: UpdateDoctorReq) -> RecordResult<DoctorChanges> {
    Ok(DoctorChanges {
        name: req.name.map(NonEmptyText::new).transpose()?,
        specialization: req.specialization,
        clinic_name: req.clinic_name,
        clinic_address: req.clinic_address,
        phone_number: req.phone_number,
    })
}

pub fn doctor_res(doctor: Doctor) -> DoctorRes {
    DoctorRes {
        id: doctor.id,
        name: doctor.name,
        email: doctor.email.as_str().to_string(),
        specialization: doctor.specialization,
        clinic_name: doctor.clinic_name,
        clinic_address: doctor.clinic_address,
        phone_number: doctor.phone_number,
        created_at: format_timestamp(doctor.created_at),
        updated_at: doctor.updated_at.map(format_timestamp),
    }
}

fn image_res(image: ImageAttachment) -> ImageRes {
    ImageRes {
        url: image.url,
        public_id: image.public_id,
    }
}

pub fn patient_res(patient: Patient) -> PatientRes {
    let medical_image = patient.medical_image().map(image_res);
    let patient_photo = patient.patient_photo().map(image_res);
    PatientRes {
        id: patient.id,
        doctor_id: patient.doctor_id,
        name: patient.name,
        age: patient.age,
        sex: patient.sex.as_str().to_string(),
        address: patient.address,
        symptoms: patient.symptoms,
        diagnosis_description: patient.diagnosis_description,
        diagnosis: patient.diagnosis,
        treatment: patient.treatment,
        medical_image,
        patient_photo,
        created_at: format_timestamp(patient.created_at),
        updated_at: format_timestamp(patient.updated_at),
    }
}

fn warning_res(warning: RecordWarning) -> WarningRes {
    WarningRes {
        code: warning.code().to_string(),
        message: warning.to_string(),
    }
}

pub fn outcome_res(outcome: Outcome<Patient>) -> PatientOutcomeRes {
    PatientOutcomeRes {
        patient: patient_res(outcome.value),
        warnings: outcome.warnings.into_iter().map(warning_res).collect(),
    }
}

pub fn dashboard_res(dashboard: Dashboard) -> DashboardRes {
    DashboardRes {
        total_patients: dashboard.total_patients,
        patients_today: dashboard.patients_today,
        recent: dashboard.recent.into_iter().map(patient_res).collect(),
    }
}

fn span_res(span: Span) -> SpanRes {
    match span {
        Span::Plain(text) => SpanRes {
            kind: "plain".into(),
            text,
        },
        Span::Bold(text) => SpanRes {
            kind: "bold".into(),
            text,
        },
    }
}

fn block_res(block: Block) -> BlockRes {
    let (kind, spans) = match block {
        Block::Paragraph(spans) => ("paragraph", spans),
        Block::ListItem(spans) => ("list_item", spans),
        Block::LineBreak => ("line_break", Vec::new()),
    };
    BlockRes {
        kind: kind.into(),
        spans: spans.into_iter().map(span_res).collect(),
    }
}

pub fn formatted_treatment_res(formatted: FormattedTreatment) -> FormattedTreatmentRes {
    let container = match formatted.container {
        Container::List => "list",
        Container::Plain => "plain",
    };
    FormattedTreatmentRes {
        container: container.into(),
        blocks: formatted.blocks.into_iter().map(block_res).collect(),
    }
}
