//! Domain model (status tables, IDs, flags, errors, events, snapshots).

pub mod errors;
pub mod events;
pub mod ids;
pub mod info;
pub mod progress;
pub mod spec;
pub mod status;

pub use self::errors::{DriverError, JobError, RESULT_CANCELLED, RESULT_FAILED};
pub use self::events::JobEvent;
pub use self::ids::{JobId, JobSerial};
pub use self::info::JobInfo;
pub use self::progress::ProgressMeter;
pub use self::spec::{JobFlags, JobSpec};
pub use self::status::{JobStatus, JobVerb};
