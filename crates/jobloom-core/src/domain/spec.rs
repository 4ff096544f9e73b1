//! Job creation options.

use serde::{Deserialize, Serialize};

/// Flags fixed at creation.
///
/// Design:
/// - `auto_finalize = false` parks a finished job in `Pending` until `Finalize`.
/// - `auto_dismiss = false` parks a finalised job in `Concluded` until `Dismiss`.
/// - `internal` jobs have no ID and publish no status events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobFlags {
    pub internal: bool,
    pub auto_finalize: bool,
    pub auto_dismiss: bool,
}

impl JobFlags {
    /// Manual finalize and manual dismiss.
    pub fn manual() -> Self {
        Self {
            internal: false,
            auto_finalize: false,
            auto_dismiss: false,
        }
    }

    pub fn internal() -> Self {
        Self {
            internal: true,
            ..Self::default()
        }
    }
}

impl Default for JobFlags {
    fn default() -> Self {
        Self {
            internal: false,
            auto_finalize: true,
            auto_dismiss: true,
        }
    }
}

/// What a front end supplies to create a job (the driver is passed separately).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Raw identifier; validated by the registry.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub flags: JobFlags,
}

impl JobSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            flags: JobFlags::default(),
        }
    }

    pub fn internal() -> Self {
        Self {
            id: None,
            flags: JobFlags::internal(),
        }
    }

    pub fn with_flags(mut self, flags: JobFlags) -> Self {
        self.flags = JobFlags {
            internal: self.flags.internal || flags.internal,
            ..flags
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_automatic() {
        let flags = JobFlags::default();
        assert!(!flags.internal);
        assert!(flags.auto_finalize);
        assert!(flags.auto_dismiss);
    }

    #[test]
    fn spec_deserializes_with_partial_flags() {
        let spec: JobSpec =
            serde_json::from_str(r#"{"id":"job0","flags":{"auto_dismiss":false}}"#).unwrap();
        assert_eq!(spec.id.as_deref(), Some("job0"));
        assert!(spec.flags.auto_finalize);
        assert!(!spec.flags.auto_dismiss);
    }

    #[test]
    fn internal_spec_stays_internal() {
        let spec = JobSpec::internal().with_flags(JobFlags::manual());
        assert!(spec.flags.internal);
        assert!(!spec.flags.auto_finalize);
    }
}
