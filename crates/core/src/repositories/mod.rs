//! Record repositories.
//!
//! Services over the document store for the two record kinds: patient records, scoped to
//! the doctor who created them, and doctor profiles.

pub mod doctors;
pub mod patients;
