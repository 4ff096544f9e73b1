//! Job info for query responses.
//!
//! This is a serializable view of a Job's current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::status::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    /// `None` for internal jobs.
    pub id: Option<JobId>,
    pub kind: String,
    pub status: JobStatus,
    pub current_progress: u64,
    pub total_progress: u64,
    pub busy: bool,
    pub paused: bool,
    pub auto_finalize: bool,
    pub auto_dismiss: bool,

    /// Set once the job has failed or been cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
}
