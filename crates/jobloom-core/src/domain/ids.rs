//! Job identifiers.
//!
//! # ID の規則
//! - 外部に見えるジョブは必ず ID を持つ（英字で始まり、残りは英数字と `-._`）
//! - 内部ジョブは ID を持たない。ログ用に ULID の serial を別途振る

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::errors::JobError;

/// User-visible job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Validate and wrap an identifier.
    pub fn parse(id: impl Into<String>) -> Result<Self, JobError> {
        let id = id.into();
        if is_well_formed(&id) {
            Ok(Self(id))
        } else {
            Err(JobError::InvalidId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Starts with a letter; the rest is alphanumeric or one of `-._`.
pub fn is_well_formed(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = JobError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Per-job serial number, assigned to every job including internal ones.
///
/// Only used to tell jobs apart in logs; never exposed as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobSerial(Ulid);

impl JobSerial {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for JobSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("job0")]
    #[case("a")]
    #[case("drive-mirror.1_x")]
    #[case("Z-9")]
    fn accepts_well_formed_ids(#[case] id: &str) {
        assert_eq!(JobId::parse(id).unwrap().as_str(), id);
    }

    #[rstest]
    #[case("")]
    #[case("0job")]
    #[case("-job")]
    #[case("job 0")]
    #[case("job/0")]
    #[case("jöb")]
    fn rejects_malformed_ids(#[case] id: &str) {
        assert!(matches!(JobId::parse(id), Err(JobError::InvalidId(bad)) if bad == id));
    }

    #[test]
    fn deserialization_validates() {
        let ok: JobId = serde_json::from_str("\"job0\"").unwrap();
        assert_eq!(ok.as_str(), "job0");
        assert!(serde_json::from_str::<JobId>("\"9lives\"").is_err());
    }

    #[test]
    fn serials_are_unique() {
        assert_ne!(JobSerial::generate(), JobSerial::generate());
        assert!(JobSerial::generate().to_string().starts_with("internal-"));
    }
}
