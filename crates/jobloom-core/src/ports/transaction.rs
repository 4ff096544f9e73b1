//! JobTransaction port - 複数ジョブをまとめて完了させるグループ
//!
//! グループの管理そのものはエンジンの外側にある。エンジンが呼ぶのは
//! 「このジョブをグループから外す」の一つだけ。

use crate::app::Job;

/// External collaborator grouping several jobs so they complete together.
pub trait JobTransaction: Send + Sync {
    /// Remove `job` from the group.
    ///
    /// Called at most once per job, from finalisation or dismissal,
    /// whichever comes first.
    fn detach(&self, job: &Job);
}
