//! Completion observers.

use std::sync::{Arc, Mutex, PoisonError};

use super::job::Job;

pub type JobObserver = Arc<dyn Fn(&Job) + Send + Sync>;

/// Invoked once during finalisation with the job's result code.
pub type CompletionCallback = Box<dyn FnOnce(&Job, i32) + Send>;

/// Which observer list to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobNotice {
    /// Finalised after a (forced) cancel.
    Cancelled,
    /// Finalised without being cancelled, successfully or not.
    Completed,
    /// Finished running and waiting for `Finalize`.
    Pending,
    /// Entered `Ready`.
    Ready,
}

impl JobNotice {
    fn slot(self) -> usize {
        match self {
            JobNotice::Cancelled => 0,
            JobNotice::Completed => 1,
            JobNotice::Pending => 2,
            JobNotice::Ready => 3,
        }
    }
}

#[derive(Default)]
pub(crate) struct JobNotifiers {
    lists: Mutex<[Vec<JobObserver>; 4]>,
}

impl JobNotifiers {
    pub(crate) fn add(&self, notice: JobNotice, observer: JobObserver) {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)[notice.slot()].push(observer);
    }

    /// Observers may call back into the job, so the list is copied out first.
    pub(crate) fn notify(&self, notice: JobNotice, job: &Job) {
        let observers = self.lists.lock().unwrap_or_else(PoisonError::into_inner)[notice.slot()].clone();
        for observer in observers {
            observer(job);
        }
    }

    pub(crate) fn clear(&self) {
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        for list in lists.iter_mut() {
            list.clear();
        }
    }
}
