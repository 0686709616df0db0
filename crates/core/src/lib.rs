//! # MediRx Core
//!
//! Core business logic for the MediRx clinical record system.
//!
//! This crate contains the record workflows and their collaborators:
//! - Patient records and doctor profiles persisted through a [`store::DocumentStore`]
//! - Image uploads to an external host with bounded retry
//! - AI-suggested diagnosis and treatment with a deterministic fallback
//! - Identity provider integration and session state
//! - Formatting of treatment text for display
//!
//! **No API concerns**: HTTP servers, request parsing and response shapes belong in
//! `api-rest` and `api-shared`.

pub mod auth;
pub mod config;
pub mod constants;
pub mod diagnosis;
pub mod doctor;
pub mod error;
pub mod images;
pub mod markdown;
pub mod patient;
pub mod repositories;
pub mod session;
pub mod store;
pub mod uuid;
pub mod validation;

pub use config::CoreConfig;
pub use error::{RecordError, RecordResult};
pub use medirx_types::{EmailAddress, NonEmptyText, Sex, TextError};
pub use repositories::doctors::DoctorDirectory;
pub use repositories::patients::{Dashboard, Outcome, RecordService, RecordWarning};
pub use session::{AuthState, Session};
