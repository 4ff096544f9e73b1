//! Lifecycle - 生成から破棄までジョブを進める操作
//!
//! # 流れ
//! 1. `start`: タスクを作って `Created -> Running`
//! 2. ドライバの `run` が返ると結果を記録し、メインループへ処理を移す（`exit`）
//! 3. `completed`: 成功なら `Waiting -> Pending`、失敗なら `Aborting`
//! 4. `finalize_single`: commit/abort -> clean -> コールバック -> オブザーバ -> `Concluded`
//! 5. `dismiss`: `Null` にして生成者の参照を解放
//!
//! `user_*` で始まる操作は外部コマンド（verb）で、verb 表で許されない状態では
//! 何も変えずに `JobError` を返す。

use tracing::{info, warn};

use super::job::{Job, JobState};
use super::notifiers::JobNotice;
use crate::domain::errors::{DriverError, JobError, RESULT_CANCELLED};
use crate::domain::status::{JobStatus, JobVerb};

impl Job {
    /// Start the job's task.
    ///
    /// The job must be freshly created: not started and still holding the
    /// initial pause.
    pub fn start(&self) {
        let Some(job) = self.arc() else {
            return;
        };
        let mut st = self.lock();
        assert!(
            !st.started() && st.paused && st.pause_count > 0,
            "job {}: started twice",
            self.label()
        );
        st.pause_count -= 1;
        st.busy = true;
        st.paused = false;
        self.transition(&mut st, JobStatus::Running);
        info!(job = %self.label(), kind = self.kind(), "job started");

        let task = self.domain().spawn(async move {
            // honour a pause requested before start
            job.pause_point().await;
            let outcome = job.driver().run(&job).await;
            job.run_finished(outcome);
        });
        st.coroutine = Some(task);
    }

    fn run_finished(&self, outcome: Result<(), DriverError>) {
        {
            let mut st = self.lock();
            assert!(st.busy, "job {}: run returned while idle", self.label());
            match outcome {
                Ok(()) => st.result = 0,
                Err(err) => {
                    if err.code() == RESULT_CANCELLED {
                        info!(job = %self.label(), "job stopped on cancel");
                    } else {
                        warn!(job = %self.label(), code = err.code(), error = %err.message(), "job failed");
                    }
                    st.result = err.code();
                    st.error = Some(err.message().to_owned());
                }
            }
        }
        self.defer_to_main_loop(|job| job.exit());
    }

    /// Run `f` once on the main loop, outside the job's task.
    ///
    /// From here on `enter` is a no-op, so `f` never races the normal wake path.
    pub fn defer_to_main_loop<F>(&self, f: F)
    where
        F: FnOnce(&Job) + Send + 'static,
    {
        let Some(job) = self.arc() else {
            return;
        };
        self.lock().deferred_to_main_loop = true;
        self.main_loop().run_once(move || f(&job));
    }

    fn exit(&self) {
        self.lock().busy = false;
        self.completed();
    }

    /// Add one pause request. A running job is kicked so it reaches a pause point soon.
    pub fn pause(&self) {
        let mut st = self.lock();
        self.pause_locked(&mut st);
    }

    fn pause_locked(&self, st: &mut JobState) {
        st.pause_count += 1;
        if !st.paused {
            self.enter_locked(st, |_| true);
        }
    }

    /// Drop one pause request; the last one wakes the job.
    ///
    /// Resuming without a matching `pause` is a bug and aborts.
    pub fn resume(&self) {
        let mut st = self.lock();
        self.resume_locked(&mut st);
    }

    fn resume_locked(&self, st: &mut JobState) {
        assert!(
            st.pause_count > 0,
            "job {}: resume without a matching pause",
            self.label()
        );
        st.pause_count -= 1;
        if st.pause_count > 0 {
            return;
        }
        // an armed sleep timer will re-evaluate the pause on its own
        self.enter_locked(st, |st| st.sleep_deadline.is_none());
    }

    /// `Pause` verb.
    pub fn user_pause(&self) -> Result<(), JobError> {
        let mut st = self.lock();
        self.check_verb(&st, JobVerb::Pause)?;
        if st.user_paused {
            return Err(JobError::AlreadyPaused(self.label().to_owned()));
        }
        st.user_paused = true;
        self.pause_locked(&mut st);
        Ok(())
    }

    /// `Resume` verb. Only undoes a `Pause` verb, never an internal pause.
    pub fn user_resume(&self) -> Result<(), JobError> {
        {
            let st = self.lock();
            if !st.user_paused {
                return Err(JobError::NotUserPaused(self.label().to_owned()));
            }
            self.check_verb(&st, JobVerb::Resume)?;
        }
        self.driver().user_resume(self);
        let mut st = self.lock();
        // a cancel may have resumed it in the meantime
        if st.user_paused {
            st.user_paused = false;
            self.resume_locked(&mut st);
        }
        Ok(())
    }

    /// `SetSpeed` verb. The value is handed to the driver as is.
    pub fn user_set_speed(&self, speed: u64) -> Result<(), JobError> {
        self.apply_verb(JobVerb::SetSpeed)?;
        self.driver().set_speed(self, speed);
        Ok(())
    }

    /// Move `Running -> Ready`. Called by drivers once they can be completed.
    pub fn transition_to_ready(&self) {
        {
            let mut st = self.lock();
            self.transition(&mut st, JobStatus::Ready);
        }
        self.notifiers.notify(JobNotice::Ready, self);
    }

    /// `Complete` verb.
    pub fn user_complete(&self) -> Result<(), JobError> {
        {
            let st = self.lock();
            self.check_verb(&st, JobVerb::Complete)?;
            if st.cancelled {
                return Err(JobError::CannotComplete(self.label().to_owned()));
            }
        }
        self.driver()
            .complete(self)
            .map_err(|_| JobError::CannotComplete(self.label().to_owned()))
    }

    /// Request cancellation.
    ///
    /// Cancellation is cooperative: a running job sees it at its next pause
    /// point or sleep. A job that never started is completed right away, and a
    /// concluded job is dismissed.
    pub fn cancel(&self, force: bool) {
        match self.status() {
            JobStatus::Null => return,
            JobStatus::Concluded => {
                self.dismiss();
                return;
            }
            _ => {}
        }

        self.cancel_async(force);

        let mut st = self.lock();
        if !st.started() {
            let completed = st.status.is_completed();
            drop(st);
            if !completed {
                self.completed();
            }
        } else if st.deferred_to_main_loop {
            // Still running the exit path: it will see the cancel itself.
            // Already waiting for finalize: abort now.
            let abort = st.is_cancelled() && st.status.is_completed() && !st.finalizing;
            drop(st);
            if abort {
                self.completed_abort();
            }
        } else {
            self.enter_locked(&mut st, |_| true);
        }
    }

    fn cancel_async(&self, force: bool) {
        // a job that never ran can only abort
        let force = self.driver().cancel(self, force) || !self.is_started();
        if self.is_user_paused() {
            self.driver().user_resume(self);
        }
        let mut st = self.lock();
        if st.user_paused {
            // no enter here: the caller decides how to wake the job
            st.user_paused = false;
            assert!(st.pause_count > 0, "job {}: user pause without count", self.label());
            st.pause_count -= 1;
        }
        // soft cancels are ignored once the job has stopped running
        if st.deferred_to_main_loop && !force {
            return;
        }
        st.cancelled = true;
        st.force_cancel |= force;
        info!(job = %self.label(), force, "job cancel requested");
    }

    /// `Cancel` verb.
    pub fn user_cancel(&self, force: bool) -> Result<(), JobError> {
        self.apply_verb(JobVerb::Cancel)?;
        self.cancel(force);
        Ok(())
    }

    /// Fold cancellation into the result code; a failure moves the job to `Aborting`.
    pub(crate) fn update_result(&self, st: &mut JobState) {
        if st.result == 0 && st.is_cancelled() {
            st.result = RESULT_CANCELLED;
        }
        if st.result != 0 {
            if st.error.is_none() {
                st.error = Some(if st.result == RESULT_CANCELLED {
                    "operation cancelled".to_owned()
                } else {
                    format!("job failed with code {}", st.result)
                });
            }
            if st.status != JobStatus::Aborting {
                self.transition(st, JobStatus::Aborting);
            }
        }
    }

    /// The job stopped running (or was cancelled before it ran).
    fn completed(&self) {
        let failed = {
            let mut st = self.lock();
            assert!(
                !st.status.is_completed(),
                "job {}: completed twice",
                self.label()
            );
            self.update_result(&mut st);
            st.result != 0
        };
        if failed {
            self.completed_abort();
        } else {
            self.completed_success();
        }
    }

    fn completed_success(&self) {
        let manual = {
            let mut st = self.lock();
            self.transition(&mut st, JobStatus::Waiting);
            self.transition(&mut st, JobStatus::Pending);
            !self.flags().auto_finalize
        };
        if manual {
            self.notifiers.notify(JobNotice::Pending, self);
        } else {
            self.do_finalize();
        }
    }

    fn completed_abort(&self) {
        self.finalize_single();
    }

    fn do_finalize(&self) {
        // a failed prepare leaves the job in Aborting
        self.prepare();
        self.finalize_single();
    }

    /// Give the driver a chance to fail before commit.
    fn prepare(&self) {
        if self.lock().result != 0 {
            return;
        }
        let Err(err) = self.driver().prepare(self) else {
            return;
        };
        warn!(job = %self.label(), code = err.code(), error = %err.message(), "job prepare failed");
        let mut st = self.lock();
        st.result = err.code();
        st.error = Some(err.message().to_owned());
        self.update_result(&mut st);
    }

    /// `Finalize` verb.
    pub fn user_finalize(&self) -> Result<(), JobError> {
        self.apply_verb(JobVerb::Finalize)?;
        self.do_finalize();
        Ok(())
    }

    /// Commit or abort, clean, and report the outcome; then conclude.
    ///
    /// The job must be in a completed status.
    pub fn finalize_single(&self) {
        let (result, started, cancelled) = {
            let mut st = self.lock();
            assert!(
                st.status.is_completed(),
                "job {}: finalized while {}",
                self.label(),
                st.status
            );
            if st.finalizing {
                return;
            }
            st.finalizing = true;
            self.update_result(&mut st);
            (st.result, st.started(), st.is_cancelled())
        };

        if result == 0 {
            self.driver().commit(self);
        } else {
            self.driver().abort(self);
        }
        self.driver().clean(self);

        let on_complete = self.lock().on_complete.take();
        if let Some(on_complete) = on_complete {
            on_complete(self, result);
        }

        if started {
            let notice = if cancelled {
                JobNotice::Cancelled
            } else {
                JobNotice::Completed
            };
            self.notifiers.notify(notice, self);
        }

        self.detach_transaction();
        self.conclude();
    }

    /// Move to `Concluded`; dismiss right away if nobody has to see the result.
    pub fn conclude(&self) {
        let dismiss = {
            let mut st = self.lock();
            self.transition(&mut st, JobStatus::Concluded);
            let started = st.started();
            st.coroutine = None;
            info!(job = %self.label(), result = st.result, "job concluded");
            self.flags().auto_dismiss || !started
        };
        if dismiss {
            self.dismiss();
        }
    }

    /// Move to `Null` and drop the creator's reference.
    pub fn dismiss(&self) {
        {
            let mut st = self.lock();
            st.busy = false;
            st.paused = false;
            st.deferred_to_main_loop = true;
        }
        self.detach_transaction();
        {
            let mut st = self.lock();
            self.transition(&mut st, JobStatus::Null);
        }
        self.release();
    }

    /// `Dismiss` verb.
    pub fn user_dismiss(&self) -> Result<(), JobError> {
        self.apply_verb(JobVerb::Dismiss)?;
        self.dismiss();
        Ok(())
    }

    /// Get rid of a job that was created but will never run.
    pub fn early_fail(&self) {
        assert_eq!(
            self.status(),
            JobStatus::Created,
            "job {}: early fail after start",
            self.label()
        );
        self.dismiss();
    }

    /// Wait until the job stops running and return its result.
    ///
    /// With manual finalize this resolves in `Pending`, before commit or abort.
    pub async fn wait_until_completed(&self) -> i32 {
        let mut status = self.watch_status();
        // the sender lives in `self`, so this cannot fail
        let _ = status.wait_for(|s| s.is_completed()).await;
        let st = self.lock();
        Job::effective_result(&st)
    }

    /// Cancel and wait for the job to stop running.
    pub async fn cancel_sync(&self, force: bool) -> i32 {
        self.cancel(force);
        self.wait_until_completed().await
    }

    /// `Complete` verb, then wait for the job to stop running.
    pub async fn complete_sync(&self) -> Result<i32, JobError> {
        self.user_complete()?;
        Ok(self.wait_until_completed().await)
    }

    /// Wait until the job is not parked at a pause point.
    pub async fn wait_unpaused(&self) {
        let mut status = self.watch_status();
        let _ = status
            .wait_for(|s| !matches!(s, JobStatus::Paused | JobStatus::Standby))
            .await;
    }
}
