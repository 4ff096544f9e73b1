//! SchedulingDomain - ジョブのタスクが走るイベントループ
//!
//! tokio の `Handle` を薄く包んだもの。ジョブのタスクもタイマーも
//! 「メインループで一度だけ走らせる処理」（bottom half）もここに投げる。

use std::fmt;
use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Event loop a job's task is bound to.
#[derive(Clone)]
pub struct SchedulingDomain {
    handle: Handle,
}

impl SchedulingDomain {
    /// The runtime the caller is running on.
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self { handle })
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut)
    }

    /// Run `f` once on this loop, outside of any job's task.
    pub fn run_once<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // detached: nobody waits for a bottom half
        drop(self.handle.spawn(async move { f() }));
    }
}

impl From<Handle> for SchedulingDomain {
    fn from(handle: Handle) -> Self {
        Self::from_handle(handle)
    }
}

impl fmt::Debug for SchedulingDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingDomain")
            .field("flavor", &self.handle.runtime_flavor())
            .finish()
    }
}
