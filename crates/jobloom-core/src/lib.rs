//! jobloom-core
//!
//! Background job lifecycle engine: long-running, cancellable, pausable
//! operations driven through a fixed state machine on a tokio runtime.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（status / verb の表, ids, flags, errors, events, info）
//! - **ports**: 外部との境界（JobDriver, JobTransaction）
//! - **app**: エンジン本体（Job, scheduler, lifecycle, JobRegistry, SchedulingDomain）
//! - **impls**: 実装（TickerDriver などデモ用）
//!
//! # 使用例
//! ```ignore
//! let registry = JobRegistry::new(SchedulingDomain::current());
//! let job = registry.create(
//!     JobSpec::new("job0"),
//!     Arc::new(TickerDriver::new(TickerConfig::default())),
//!     SchedulingDomain::current(),
//!     None,
//! )?;
//! job.start();
//! let result = job.wait_until_completed().await;
//! ```

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;

pub use app::{CompletionCallback, Job, JobNotice, JobObserver, JobRegistry, SchedulingDomain};
pub use domain::{
    DriverError, JobError, JobEvent, JobFlags, JobId, JobInfo, JobSpec, JobStatus, JobVerb,
    RESULT_CANCELLED, RESULT_FAILED,
};
pub use ports::{JobDriver, JobTransaction};
