//! App - ジョブエンジン本体
//!
//! # 主要コンポーネント
//! - **Job**: 一つのジョブ（状態・カウンタ・ドライバ）
//! - **Scheduler**: タスクの中断と再開（enter / yield / sleep / pause point）
//! - **Lifecycle**: start から dismiss までの操作と verb
//! - **JobRegistry**: 生きているジョブの一覧
//! - **SchedulingDomain**: ジョブのタスクと bottom half が走るイベントループ

pub mod job;
pub mod notifiers;
pub mod registry;
pub mod scheduling;

mod lifecycle;
mod scheduler;

// 主要な型を再エクスポート
pub use self::job::Job;
pub use self::notifiers::{CompletionCallback, JobNotice, JobObserver};
pub use self::registry::JobRegistry;
pub use self::scheduling::SchedulingDomain;
