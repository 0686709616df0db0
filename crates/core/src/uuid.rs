//! Document identifiers and sharded-path utilities.
//!
//! Documents are stored under sharded directories derived from their identifier:
//! `parent_dir/<id[0..2]>/<id[2..4]>/<id>/`. This keeps directory fan-out bounded as the
//! number of patients grows.
//!
//! Two kinds of identifier reach the store:
//! - ids allocated by the store itself, which are always the canonical form of a v4 UUID
//!   (32 lowercase hex characters, no hyphens), and
//! - ids chosen by an external collaborator, most notably the identity provider's user id
//!   that doubles as the doctor profile id.
//!
//! Both are accepted by [`DocumentId::parse`] as long as they are path-safe.

use crate::store::{StoreError, StoreResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

use ::uuid::Uuid;

const MIN_ID_LEN: usize = 4;
const MAX_ID_LEN: usize = 128;

/// A validated, path-safe document identifier.
///
/// Once constructed the id is guaranteed to be 4–128 characters drawn from
/// `[A-Za-z0-9_-]`, so it can be joined onto a filesystem path without traversal risk.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Allocates a fresh identifier in canonical UUID form.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validates an externally supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidId`] if `input` is too short, too long or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn parse(input: &str) -> StoreResult<Self> {
        if Self::is_path_safe(input) {
            return Ok(Self(input.to_string()));
        }
        Err(StoreError::InvalidId(input.to_string()))
    }

    /// Returns true if `input` is in canonical UUID form (32 lowercase hex characters).
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    fn is_path_safe(input: &str) -> bool {
        (MIN_ID_LEN..=MAX_ID_LEN).contains(&input.len())
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'-'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `parent_dir/<s1>/<s2>/<id>/` where `s1`/`s2` are the first two pairs of
    /// characters of the id.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let s1 = &self.0[0..2];
        let s2 = &self.0[2..4];
        parent_dir.join(s1).join(s2).join(&self.0)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentId::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_id() {
        let id = DocumentId::new();
        assert!(DocumentId::is_canonical(id.as_str()));
    }

    #[test]
    fn test_parse_accepts_identity_provider_ids() {
        let id = DocumentId::parse("Xk3fQ9aB7cD2eF4gH6iJ8kL0mN1o").unwrap();
        assert_eq!(id.as_str(), "Xk3fQ9aB7cD2eF4gH6iJ8kL0mN1o");
    }

    #[test]
    fn test_parse_rejects_path_traversal() {
        for input in ["../etc/passwd", "a/b/c/d", "abc", "", "with space", "dots.dots"] {
            assert!(
                matches!(DocumentId::parse(input), Err(StoreError::InvalidId(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_overlong_ids() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(DocumentId::parse(&long).is_err());
    }

    #[test]
    fn test_sharded_dir_layout() {
        let id = DocumentId::parse("550e8400e29b41d4a716446655440000").unwrap();
        let dir = id.sharded_dir(Path::new("/data/patients"));
        assert_eq!(
            dir,
            PathBuf::from("/data/patients/55/0e/550e8400e29b41d4a716446655440000")
        );
    }
}
