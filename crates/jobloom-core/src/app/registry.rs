//! JobRegistry - プロセス内の生きているジョブの一覧
//!
//! # 設計
//! - グローバル変数ではなく明示的に持つオブジェクト（テストごとに独立した registry を作れる）
//! - 一覧は一つの Mutex で守る。ジョブのロックを持ったまま registry のロックは取らない
//! - 並びは生成順（`jobs()` はその順のスナップショット）
//! - ステータスイベントは registry の broadcast チャネルに流れる（internal ジョブは除く）

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::info;

use super::job::{Job, NewJob};
use super::notifiers::CompletionCallback;
use super::scheduling::SchedulingDomain;
use crate::domain::errors::JobError;
use crate::domain::events::JobEvent;
use crate::domain::ids::JobId;
use crate::domain::info::JobInfo;
use crate::domain::spec::JobSpec;
use crate::domain::status::JobStatus;
use crate::ports::JobDriver;

const EVENT_CAPACITY: usize = 64;

pub(crate) struct RegistryShared {
    jobs: Mutex<Vec<Arc<Job>>>,
    main_loop: SchedulingDomain,
    events: broadcast::Sender<JobEvent>,
}

impl RegistryShared {
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called when the job is destroyed.
    pub(crate) fn remove(&self, job: &Job) {
        self.lock().retain(|j| !std::ptr::eq(Arc::as_ptr(j), job));
    }
}

/// All live jobs, in creation order.
///
/// Cheap to clone; clones share the same list.
#[derive(Clone)]
pub struct JobRegistry {
    shared: Arc<RegistryShared>,
}

impl JobRegistry {
    /// `main_loop` runs the bottom halves of every job created here.
    pub fn new(main_loop: SchedulingDomain) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(RegistryShared {
                jobs: Mutex::new(Vec::new()),
                main_loop,
                events,
            }),
        }
    }

    pub fn main_loop(&self) -> &SchedulingDomain {
        &self.shared.main_loop
    }

    /// Create a job in `Created`.
    ///
    /// External jobs need a well-formed, unused ID. Internal jobs must not
    /// have one. The returned job holds one reference for the caller, which
    /// is dropped by dismissal.
    pub fn create(
        &self,
        spec: JobSpec,
        driver: Arc<dyn JobDriver>,
        domain: SchedulingDomain,
        on_complete: Option<CompletionCallback>,
    ) -> Result<Arc<Job>, JobError> {
        let mut jobs = self.shared.lock();

        let id = match (spec.id, spec.flags.internal) {
            (Some(raw), true) => return Err(JobError::InternalWithId(raw)),
            (Some(raw), false) => {
                let id = JobId::parse(raw)?;
                if jobs.iter().any(|j| j.id() == Some(&id)) {
                    return Err(JobError::DuplicateId(id.to_string()));
                }
                Some(id)
            }
            (None, false) => return Err(JobError::MissingId),
            (None, true) => None,
        };

        let job = Job::new(NewJob {
            id,
            driver,
            flags: spec.flags,
            domain,
            main_loop: self.shared.main_loop.clone(),
            registry: Arc::downgrade(&self.shared),
            events: self.shared.events.clone(),
            on_complete,
        });
        info!(job = %job.label(), kind = job.kind(), flags = ?job.flags(), "job created");
        jobs.push(job.clone());
        Ok(job)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        self.shared
            .lock()
            .iter()
            .find(|j| j.id().is_some_and(|jid| jid.as_str() == id))
            .cloned()
    }

    /// Like [`get`](Self::get), for front ends that report the miss.
    pub fn find(&self, id: &str) -> Result<Arc<Job>, JobError> {
        self.get(id).ok_or_else(|| JobError::NotFound(id.to_owned()))
    }

    /// Snapshot of all jobs in creation order, internal ones included.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.shared.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    pub fn job_ref(&self, job: &Job) {
        job.retain();
    }

    /// Drop a reference; the job leaves the registry when the last one goes.
    pub fn job_unref(&self, job: &Job) {
        job.release();
    }

    /// Status changes of all external jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshots of all external jobs.
    pub fn query(&self) -> Vec<JobInfo> {
        self.jobs()
            .iter()
            .filter(|j| !j.is_internal())
            .map(|j| j.info())
            .collect()
    }

    /// Force-cancel every job and wait until each one is gone.
    ///
    /// Jobs someone still holds a reference to stay listed in `Null`.
    pub async fn cancel_all_sync(&self) {
        loop {
            let live: Vec<_> = self
                .jobs()
                .into_iter()
                .filter(|j| j.status() != JobStatus::Null)
                .collect();
            if live.is_empty() {
                break;
            }
            for job in live {
                job.cancel_sync(true).await;
            }
            // let pending bottom halves run before looking again
            tokio::task::yield_now().await;
        }
        info!("all jobs cancelled");
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.len())
            .finish_non_exhaustive()
    }
}
