//! Job - 一つの長時間処理を表すエンティティ
//!
//! # 構造
//! - 生成後に変わらないもの（id, driver, flags, domain）は `Job` のフィールド
//! - 変わるもの（status, busy, pause_count, タイマー, ...）は `JobState` にまとめて
//!   一つの Mutex で守る
//! - ドライバのフックやオブザーバはロックを持たずに呼ぶ
//!
//! 状態の書き換えは必ず `transition()` を通す（表にない遷移は panic）。

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info};

use super::notifiers::{CompletionCallback, JobNotice, JobNotifiers};
use super::registry::RegistryShared;
use super::scheduling::SchedulingDomain;
use crate::domain::errors::{JobError, RESULT_CANCELLED};
use crate::domain::events::JobEvent;
use crate::domain::ids::{JobId, JobSerial};
use crate::domain::info::JobInfo;
use crate::domain::progress::ProgressMeter;
use crate::domain::spec::JobFlags;
use crate::domain::status::{JobStatus, JobVerb};
use crate::ports::{JobDriver, JobTransaction};

/// Mutable part of a job. Every field is guarded by `Job::state`.
pub(crate) struct JobState {
    pub(crate) status: JobStatus,
    pub(crate) refcnt: usize,
    pub(crate) freed: bool,

    /// The job's task is running (not suspended).
    pub(crate) busy: bool,
    /// Blocked at a pause point.
    pub(crate) paused: bool,
    /// Pause requests outstanding; the job should pause while > 0.
    pub(crate) pause_count: u32,
    pub(crate) user_paused: bool,

    /// A cancel was requested (soft or forced).
    pub(crate) cancelled: bool,
    /// At least one of the cancel requests was forced.
    pub(crate) force_cancel: bool,

    pub(crate) result: i32,
    pub(crate) error: Option<String>,

    pub(crate) deferred_to_main_loop: bool,
    pub(crate) finalizing: bool,

    pub(crate) sleep_deadline: Option<Instant>,
    pub(crate) sleep_timer: Option<AbortHandle>,

    /// Set by `start`, cleared on conclusion.
    pub(crate) coroutine: Option<JoinHandle<()>>,

    pub(crate) progress: ProgressMeter,
    pub(crate) on_complete: Option<CompletionCallback>,
    pub(crate) txn: Option<Arc<dyn JobTransaction>>,
}

impl JobState {
    fn new(on_complete: Option<CompletionCallback>) -> Self {
        Self {
            status: JobStatus::Undefined,
            refcnt: 1,
            freed: false,
            busy: false,
            paused: true,
            pause_count: 1,
            user_paused: false,
            cancelled: false,
            force_cancel: false,
            result: 0,
            error: None,
            deferred_to_main_loop: false,
            finalizing: false,
            sleep_deadline: None,
            sleep_timer: None,
            coroutine: None,
            progress: ProgressMeter::default(),
            on_complete,
            txn: None,
        }
    }

    pub(crate) fn started(&self) -> bool {
        self.coroutine.is_some()
    }

    pub(crate) fn should_pause(&self) -> bool {
        self.pause_count > 0
    }

    /// Only forced cancels stop the job at pause points.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled && self.force_cancel
    }

    pub(crate) fn cancel_sleep_timer(&mut self) {
        if let Some(timer) = self.sleep_timer.take() {
            timer.abort();
        }
        self.sleep_deadline = None;
    }
}

/// One long-running, cancellable, pausable operation.
///
/// Jobs are created by [`JobRegistry::create`](super::JobRegistry::create)
/// and always live inside an `Arc`.
pub struct Job {
    this: Weak<Job>,
    id: Option<JobId>,
    label: String,
    driver: Arc<dyn JobDriver>,
    flags: JobFlags,
    domain: SchedulingDomain,
    main_loop: SchedulingDomain,
    created_at: DateTime<Utc>,

    registry: Weak<RegistryShared>,
    events: broadcast::Sender<JobEvent>,

    state: Mutex<JobState>,
    pub(crate) wake: Notify,
    status_tx: watch::Sender<JobStatus>,
    pub(crate) notifiers: JobNotifiers,
}

pub(crate) struct NewJob {
    pub(crate) id: Option<JobId>,
    pub(crate) driver: Arc<dyn JobDriver>,
    pub(crate) flags: JobFlags,
    pub(crate) domain: SchedulingDomain,
    pub(crate) main_loop: SchedulingDomain,
    pub(crate) registry: Weak<RegistryShared>,
    pub(crate) events: broadcast::Sender<JobEvent>,
    pub(crate) on_complete: Option<CompletionCallback>,
}

impl Job {
    /// Build the job and move it to `Created`.
    pub(crate) fn new(new: NewJob) -> Arc<Self> {
        let label = match &new.id {
            Some(id) => id.to_string(),
            None => JobSerial::generate().to_string(),
        };
        let job = Arc::new_cyclic(|this| Job {
            this: this.clone(),
            id: new.id,
            label,
            driver: new.driver,
            flags: new.flags,
            domain: new.domain,
            main_loop: new.main_loop,
            created_at: Utc::now(),
            registry: new.registry,
            events: new.events,
            state: Mutex::new(JobState::new(new.on_complete)),
            wake: Notify::new(),
            status_tx: watch::Sender::new(JobStatus::Undefined),
            notifiers: JobNotifiers::default(),
        });
        {
            let mut st = job.lock();
            job.transition(&mut st, JobStatus::Created);
        }
        job
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn arc(&self) -> Option<Arc<Job>> {
        self.this.upgrade()
    }

    pub(crate) fn main_loop(&self) -> &SchedulingDomain {
        &self.main_loop
    }

    pub(crate) fn driver(&self) -> &dyn JobDriver {
        self.driver.as_ref()
    }

    /// Move to `to`. Illegal moves are a bug in the caller and abort.
    pub(crate) fn transition(&self, st: &mut JobState, to: JobStatus) {
        let from = st.status;
        assert!(
            from.can_transition_to(to),
            "job {}: illegal status transition {from} -> {to}",
            self.label
        );
        debug!(job = %self.label, %from, %to, "job status transition");
        st.status = to;
        self.status_tx.send_replace(to);
        if from != to
            && !self.flags.internal
            && let Some(id) = &self.id
        {
            // no subscribers is fine
            let _ = self.events.send(JobEvent::StatusChange {
                id: id.clone(),
                status: to,
            });
        }
    }

    pub(crate) fn check_verb(&self, st: &JobState, verb: JobVerb) -> Result<(), JobError> {
        let allowed = verb.is_allowed_in(st.status);
        debug!(job = %self.label, %verb, status = %st.status, allowed, "apply job verb");
        if allowed {
            Ok(())
        } else {
            Err(JobError::VerbNotPermitted {
                id: self.label.clone(),
                status: st.status,
                verb,
            })
        }
    }

    /// Check `verb` against the current status without doing anything else.
    pub fn apply_verb(&self, verb: JobVerb) -> Result<(), JobError> {
        let st = self.lock();
        self.check_verb(&st, verb)
    }

    pub fn id(&self) -> Option<&JobId> {
        self.id.as_ref()
    }

    /// ID for external jobs, a serial for internal ones.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &'static str {
        self.driver.kind()
    }

    pub fn flags(&self) -> JobFlags {
        self.flags
    }

    pub fn is_internal(&self) -> bool {
        self.flags.internal
    }

    pub fn domain(&self) -> &SchedulingDomain {
        &self.domain
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    /// Follow status changes.
    pub fn watch_status(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    pub fn result(&self) -> i32 {
        self.lock().result
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn pause_count(&self) -> u32 {
        self.lock().pause_count
    }

    pub fn should_pause(&self) -> bool {
        self.lock().should_pause()
    }

    pub fn is_user_paused(&self) -> bool {
        self.lock().user_paused
    }

    /// A forced cancel was requested.
    pub fn is_cancelled(&self) -> bool {
        self.lock().is_cancelled()
    }

    /// Any cancel, soft or forced, was requested.
    pub fn cancel_requested(&self) -> bool {
        self.lock().cancelled
    }

    pub fn is_started(&self) -> bool {
        self.lock().started()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().status.is_ready()
    }

    pub fn is_completed(&self) -> bool {
        self.lock().status.is_completed()
    }

    pub fn is_deferred_to_main_loop(&self) -> bool {
        self.lock().deferred_to_main_loop
    }

    pub fn sleep_deadline(&self) -> Option<Instant> {
        self.lock().sleep_deadline
    }

    pub fn refcount(&self) -> usize {
        self.lock().refcnt
    }

    pub fn progress(&self) -> ProgressMeter {
        self.lock().progress
    }

    pub fn progress_update(&self, done: u64) {
        self.lock().progress.update(done);
    }

    pub fn progress_set_remaining(&self, remaining: u64) {
        self.lock().progress.set_remaining(remaining);
    }

    pub fn progress_increase_remaining(&self, delta: u64) {
        self.lock().progress.increase_remaining(delta);
    }

    /// Subscribe to one of the observer lists.
    pub fn subscribe<F>(&self, notice: JobNotice, observer: F)
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.notifiers.add(notice, Arc::new(observer));
    }

    pub fn on_cancelled<F>(&self, observer: F)
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.subscribe(JobNotice::Cancelled, observer);
    }

    pub fn on_completed<F>(&self, observer: F)
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.subscribe(JobNotice::Completed, observer);
    }

    pub fn on_pending<F>(&self, observer: F)
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.subscribe(JobNotice::Pending, observer);
    }

    pub fn on_ready<F>(&self, observer: F)
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.subscribe(JobNotice::Ready, observer);
    }

    /// Put the job in a transaction group. The group is told when the job leaves it.
    pub fn attach_transaction(&self, txn: Arc<dyn JobTransaction>) {
        self.lock().txn = Some(txn);
    }

    pub(crate) fn detach_transaction(&self) {
        let txn = self.lock().txn.take();
        if let Some(txn) = txn {
            txn.detach(self);
        }
    }

    /// Take a reference.
    pub fn retain(&self) {
        let mut st = self.lock();
        assert!(
            !st.freed && st.refcnt > 0,
            "job {}: reference taken on a destroyed job",
            self.label
        );
        st.refcnt += 1;
    }

    /// Drop a reference; the last one destroys the job.
    ///
    /// Releasing a reference the caller does not hold is a bug and aborts.
    pub fn release(&self) {
        {
            let mut st = self.lock();
            assert!(
                !st.freed && st.refcnt > 0,
                "job {}: reference released on a destroyed job",
                self.label
            );
            st.refcnt -= 1;
            if st.refcnt > 0 {
                return;
            }
            assert_eq!(
                st.status,
                JobStatus::Null,
                "job {}: last reference dropped while not dismissed",
                self.label
            );
            assert!(
                st.sleep_deadline.is_none(),
                "job {}: last reference dropped with a sleep timer armed",
                self.label
            );
            st.freed = true;
        }
        self.destroy();
    }

    fn destroy(&self) {
        info!(job = %self.label, kind = self.kind(), "job destroyed");
        self.driver.free(self);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self);
        }
        self.notifiers.clear();
        let mut st = self.lock();
        st.on_complete = None;
        st.txn = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().freed
    }

    /// Snapshot for query responses.
    pub fn info(&self) -> JobInfo {
        let st = self.lock();
        let error = match (&st.error, st.is_cancelled()) {
            (Some(err), _) => Some(err.clone()),
            (None, true) => Some("operation cancelled".to_owned()),
            (None, false) => None,
        };
        JobInfo {
            id: self.id.clone(),
            kind: self.kind().to_owned(),
            status: st.status,
            current_progress: st.progress.current,
            total_progress: st.progress.total,
            busy: st.busy,
            paused: st.paused,
            auto_finalize: self.flags.auto_finalize,
            auto_dismiss: self.flags.auto_dismiss,
            error,
            created_at: self.created_at,
        }
    }

    /// Result as seen by synchronous waiters: a cancelled job that reported
    /// success still counts as cancelled.
    pub(crate) fn effective_result(st: &JobState) -> i32 {
        if st.is_cancelled() && st.result == 0 {
            RESULT_CANCELLED
        } else {
            st.result
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.label)
            .field("kind", &self.kind())
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
