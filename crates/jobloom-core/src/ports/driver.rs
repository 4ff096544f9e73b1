//! JobDriver port - ジョブの種類ごとの実装が満たす能力インターフェース
//!
//! エンジンはこの trait を通してのみ具体的なジョブ（mirror, stream, backup など）を呼ぶ。
//! 必須なのは `kind` と `run` だけで、残りはすべて既定の実装を持つ。
//!
//! # 呼ばれる場所
//! - `run` / `pause` / `resume`: ジョブ自身のタスクの中（async）
//! - それ以外: エンジンのロックを持たない状態でメインループ側から（同期）

use async_trait::async_trait;

use crate::app::Job;
use crate::domain::errors::DriverError;

/// Capability interface implemented by each concrete job kind.
///
/// One driver instance belongs to exactly one job, so per-job state lives in
/// the implementing type.
///
/// # Example
/// ```ignore
/// struct CopyDriver;
///
/// #[async_trait]
/// impl JobDriver for CopyDriver {
///     fn kind(&self) -> &'static str {
///         "copy"
///     }
///
///     async fn run(&self, job: &Job) -> Result<(), DriverError> {
///         while !job.is_cancelled() {
///             // copy a chunk, then let pauses and cancellation in
///             job.sleep(Duration::from_millis(10)).await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait JobDriver: Send + Sync + 'static {
    /// Job type shown in queries and logs (e.g. `"mirror"`).
    fn kind(&self) -> &'static str;

    /// Main body. Returning marks the job ready to be finalised; an error
    /// routes finalisation through `abort`.
    async fn run(&self, job: &Job) -> Result<(), DriverError>;

    /// Called at a pause point before the job suspends.
    async fn pause(&self, _job: &Job) {}

    /// Called at a pause point after the job is resumed.
    async fn resume(&self, _job: &Job) {}

    /// Last chance to fail before `commit` on the success path.
    fn prepare(&self, _job: &Job) -> Result<(), DriverError> {
        Ok(())
    }

    fn commit(&self, _job: &Job) {}

    fn abort(&self, _job: &Job) {}

    /// Always called after `commit` or `abort`.
    fn clean(&self, _job: &Job) {}

    /// Push the job towards a quiescent point.
    fn drain(&self, _job: &Job) {}

    /// Called before a user-requested resume takes effect.
    fn user_resume(&self, _job: &Job) {}

    /// Handle the `Complete` verb. Drivers without a completion step keep the default.
    fn complete(&self, _job: &Job) -> Result<(), DriverError> {
        Err(DriverError::unsupported("complete"))
    }

    /// Decide whether a cancel request is forced. Returning `false` turns it
    /// into a soft cancel that the driver handles itself.
    fn cancel(&self, _job: &Job, _force: bool) -> bool {
        true
    }

    /// Receives the value of a `SetSpeed` verb. The engine does no rate limiting.
    fn set_speed(&self, _job: &Job, _speed: u64) {}

    /// Called exactly once, when the last reference to the job is dropped.
    fn free(&self, _job: &Job) {}
}
