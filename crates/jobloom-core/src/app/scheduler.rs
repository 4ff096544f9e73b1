//! Scheduler - ジョブのタスクの中断と再開
//!
//! # 仕組み
//! - 中断（yield）: `busy = false` にして `wake` を待つ
//! - 再開（enter）: ロックの中で `busy` が false なら true にして `wake` を一度だけ鳴らす
//! - タイマー: 期限つきの yield はドメイン上に sleep タスクを立て、期限で enter する
//!
//! `busy` とタイマーの状態はジョブの Mutex で守られているので、タイマーの発火と
//! 明示的な enter が競合しても、負けた側は `busy == true` を見て何もしない。

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::job::{Job, JobState};
use crate::domain::status::JobStatus;

impl Job {
    /// Wake the job's task if it is suspended.
    ///
    /// No-op before start, after the job handed off to the main loop, or while
    /// the task is already running.
    pub fn enter(&self) {
        let mut st = self.lock();
        self.enter_locked(&mut st, |_| true);
    }

    pub(crate) fn enter_locked(&self, st: &mut JobState, guard: impl FnOnce(&JobState) -> bool) {
        if !st.started() || st.deferred_to_main_loop || st.busy {
            return;
        }
        if !guard(st) {
            return;
        }
        st.cancel_sleep_timer();
        st.busy = true;
        trace!(job = %self.label(), "enter job");
        // At most one permit is ever outstanding: only a busy false -> true edge notifies.
        self.wake.notify_one();
    }

    /// First half of a yield, done under the lock.
    fn begin_yield(&self, st: &mut JobState, deadline: Option<Instant>) {
        assert!(st.busy, "job {}: yield while not running", self.label());
        st.busy = false;
        if let Some(deadline) = deadline {
            self.arm_sleep_timer(st, deadline);
        }
        trace!(job = %self.label(), ?deadline, "job yields");
    }

    /// Second half of a yield: wait for whoever enters us.
    async fn finish_yield(&self) {
        self.wake.notified().await;
        let st = self.lock();
        assert!(st.busy, "job {}: resumed without being entered", self.label());
    }

    fn arm_sleep_timer(&self, st: &mut JobState, deadline: Instant) {
        st.cancel_sleep_timer();
        st.sleep_deadline = Some(deadline);
        let Some(job) = self.arc() else {
            return;
        };
        let job = std::sync::Arc::downgrade(&job);
        let timer = self.domain().spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(job) = job.upgrade() {
                job.sleep_timer_fired(deadline);
            }
        });
        st.sleep_timer = Some(timer.abort_handle());
    }

    fn sleep_timer_fired(&self, deadline: Instant) {
        let mut st = self.lock();
        // a stale timer from an earlier yield
        if st.sleep_deadline != Some(deadline) {
            return;
        }
        st.sleep_deadline = None;
        st.sleep_timer = None;
        trace!(job = %self.label(), "sleep timer fired");
        self.enter_locked(&mut st, |_| true);
    }

    /// Suspend until entered, or until `deadline` if one is given.
    ///
    /// Must be called from the job's own task. This is the raw primitive; drivers
    /// usually want [`yield_now`](Self::yield_now) or [`sleep`](Self::sleep),
    /// which also honour pause and cancel requests.
    pub async fn suspend(&self, deadline: Option<Instant>) {
        {
            let mut st = self.lock();
            self.begin_yield(&mut st, deadline);
        }
        self.finish_yield().await;
    }

    /// Suspend until explicitly entered, then run a pause point.
    ///
    /// Returns at once if the job is cancelled.
    pub async fn yield_now(&self) {
        let yielded = {
            let mut st = self.lock();
            assert!(st.busy, "job {}: yield while not running", self.label());
            if st.is_cancelled() {
                return;
            }
            if st.should_pause() {
                false
            } else {
                self.begin_yield(&mut st, None);
                true
            }
        };
        if yielded {
            self.finish_yield().await;
        }
        self.pause_point().await;
    }

    /// Sleep for `duration`, then run a pause point.
    ///
    /// Returns at once if the job is cancelled. A pending pause skips the sleep
    /// and goes straight to the pause point. Any `enter` cuts the sleep short.
    /// A duration too large for a deadline sleeps until entered.
    pub async fn sleep(&self, duration: Duration) {
        let yielded = {
            let mut st = self.lock();
            assert!(st.busy, "job {}: sleep while not running", self.label());
            if st.is_cancelled() {
                return;
            }
            if st.should_pause() {
                false
            } else {
                let deadline = Instant::now().checked_add(duration);
                self.begin_yield(&mut st, deadline);
                true
            }
        };
        if yielded {
            self.finish_yield().await;
        }
        self.pause_point().await;
    }

    /// Stop here while a pause is requested.
    ///
    /// Must be called from the job's own task. A cancelled job never pauses.
    pub async fn pause_point(&self) {
        {
            let st = self.lock();
            assert!(st.started(), "job {}: pause point before start", self.label());
            if !st.should_pause() || st.is_cancelled() {
                return;
            }
        }

        self.driver().pause(self).await;

        let prior = {
            let mut st = self.lock();
            if st.should_pause() && !st.is_cancelled() {
                let prior = st.status;
                let to = if prior == JobStatus::Ready {
                    JobStatus::Standby
                } else {
                    JobStatus::Paused
                };
                self.transition(&mut st, to);
                st.paused = true;
                self.begin_yield(&mut st, None);
                Some(prior)
            } else {
                None
            }
        };

        if let Some(prior) = prior {
            self.finish_yield().await;
            let mut st = self.lock();
            st.paused = false;
            self.transition(&mut st, prior);
        }

        self.driver().resume(self).await;
    }

    /// Kick the job once and let its driver push it towards a quiescent point.
    pub fn drain(&self) {
        self.enter();
        self.driver().drain(self);
    }
}
