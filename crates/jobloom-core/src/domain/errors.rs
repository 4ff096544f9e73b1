//! Errors - エラー型と分類
//!
//! # 分類
//! - `JobError`: 呼び出し元に返す利用者／プロトコルのエラー。ジョブの状態は変えない
//! - `DriverError`: ジョブ自身の失敗。`result` に入り、commit ではなく abort 側へ進む
//! - 不正な状態遷移などの不変条件違反は panic（ここには含めない）

use thiserror::Error;

use super::status::{JobStatus, JobVerb};

/// Result code of a job that was cancelled (`-ECANCELED`).
pub const RESULT_CANCELLED: i32 = -125;

/// Result code used when a driver reports failure with a zero code (`-EIO`).
pub const RESULT_FAILED: i32 = -5;

/// Errors reported to whoever issued a command or created a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Job '{id}' in state '{status}' cannot accept command verb '{verb}'")]
    VerbNotPermitted {
        id: String,
        status: JobStatus,
        verb: JobVerb,
    },

    #[error("Invalid job ID '{0}'")]
    InvalidId(String),

    #[error("Job ID '{0}' already in use")]
    DuplicateId(String),

    #[error("An explicit job ID is required")]
    MissingId,

    #[error("Cannot specify job ID '{0}' for an internal job")]
    InternalWithId(String),

    #[error("Job '{0}' is already paused")]
    AlreadyPaused(String),

    #[error("Can't resume job '{0}' that was not paused")]
    NotUserPaused(String),

    #[error("Job '{0}' cannot be completed")]
    CannotComplete(String),

    #[error("Job '{0}' not found")]
    NotFound(String),
}

/// Failure reported by a driver hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct DriverError {
    code: i32,
    message: String,
}

impl DriverError {
    /// `code` is a negative errno-style value; zero is replaced by `RESULT_FAILED`.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: if code == 0 { RESULT_FAILED } else { code },
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(RESULT_FAILED, message)
    }

    pub fn cancelled() -> Self {
        Self::new(RESULT_CANCELLED, "operation cancelled")
    }

    /// Used by the default `complete` hook of drivers that have no completion step.
    pub fn unsupported(operation: &str) -> Self {
        Self::new(-95, format!("{operation} is not supported"))
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_error_names_id_state_and_verb() {
        let err = JobError::VerbNotPermitted {
            id: "job0".into(),
            status: JobStatus::Running,
            verb: JobVerb::Complete,
        };
        assert_eq!(
            err.to_string(),
            "Job 'job0' in state 'running' cannot accept command verb 'complete'"
        );
    }

    #[test]
    fn driver_error_never_carries_zero() {
        assert_eq!(DriverError::new(0, "boom").code(), RESULT_FAILED);
        assert_eq!(DriverError::new(-28, "no space").code(), -28);
        assert_eq!(DriverError::cancelled().code(), RESULT_CANCELLED);
    }
}
