//! TickerDriver - 一定間隔で進むだけのデモ用ドライバ
//!
//! # 振る舞い
//! - `steps` 回、`step_ms` ずつ sleep して進捗を 1 ずつ進める
//! - `wait_for_complete` なら最後に `Ready` になり、`Complete` verb まで同期を続ける
//!   （mirror 型のジョブと同じ形）
//! - `fail_at` を指定するとその step で失敗する
//!
//! CLI とテストで使う。呼ばれたフックは `calls()` で確認できる。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::Job;
use crate::domain::errors::DriverError;
use crate::ports::JobDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub steps: u64,
    pub step_ms: u64,
    pub wait_for_complete: bool,
    pub fail_at: Option<u64>,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            steps: 10,
            step_ms: 100,
            wait_for_complete: false,
            fail_at: None,
        }
    }
}

impl TickerConfig {
    fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

/// Demo driver that ticks through a fixed number of steps.
pub struct TickerDriver {
    config: TickerConfig,
    should_complete: AtomicBool,
    speed: AtomicU64,
    calls: Mutex<Vec<&'static str>>,
}

impl TickerDriver {
    pub fn new(config: TickerConfig) -> Self {
        Self {
            config,
            should_complete: AtomicBool::new(false),
            speed: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &TickerConfig {
        &self.config
    }

    /// Last value set by the `SetSpeed` verb (0 = unlimited).
    pub fn speed(&self) -> u64 {
        self.speed.load(Ordering::SeqCst)
    }

    /// Hooks the engine has called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, hook: &'static str) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }
}

#[async_trait]
impl JobDriver for TickerDriver {
    fn kind(&self) -> &'static str {
        "ticker"
    }

    async fn run(&self, job: &Job) -> Result<(), DriverError> {
        let step = self.config.step();
        job.progress_set_remaining(self.config.steps);

        for n in 0..self.config.steps {
            if job.is_cancelled() {
                return Err(DriverError::cancelled());
            }
            if self.config.fail_at == Some(n) {
                return Err(DriverError::failed(format!("step {n} failed")));
            }
            job.sleep(step).await;
            job.progress_update(1);
            debug!(job = %job.label(), step = n, "tick");
        }

        if !self.config.wait_for_complete {
            return Ok(());
        }
        job.transition_to_ready();
        // keep in sync until completed or cancelled
        while !self.should_complete.load(Ordering::SeqCst) && !job.cancel_requested() {
            job.sleep(step).await;
        }
        Ok(())
    }

    async fn pause(&self, _job: &Job) {
        self.record("pause");
    }

    async fn resume(&self, _job: &Job) {
        self.record("resume");
    }

    fn prepare(&self, _job: &Job) -> Result<(), DriverError> {
        self.record("prepare");
        Ok(())
    }

    fn commit(&self, _job: &Job) {
        self.record("commit");
    }

    fn abort(&self, _job: &Job) {
        self.record("abort");
    }

    fn clean(&self, _job: &Job) {
        self.record("clean");
    }

    fn drain(&self, _job: &Job) {
        self.record("drain");
    }

    fn user_resume(&self, _job: &Job) {
        self.record("user_resume");
    }

    fn complete(&self, job: &Job) -> Result<(), DriverError> {
        if !job.is_ready() {
            return Err(DriverError::failed("not ready"));
        }
        self.should_complete.store(true, Ordering::SeqCst);
        job.enter();
        Ok(())
    }

    /// A soft cancel of a ready job completes it instead.
    fn cancel(&self, job: &Job, force: bool) -> bool {
        force || !job.is_ready()
    }

    fn set_speed(&self, _job: &Job, speed: u64) {
        self.speed.store(speed, Ordering::SeqCst);
    }

    fn free(&self, _job: &Job) {
        self.record("free");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::app::{JobRegistry, SchedulingDomain};
    use crate::domain::errors::{RESULT_CANCELLED, RESULT_FAILED};
    use crate::domain::spec::JobSpec;
    use crate::domain::status::JobStatus;

    fn spawn(config: TickerConfig) -> (JobRegistry, Arc<TickerDriver>, Arc<Job>) {
        let reg = JobRegistry::new(SchedulingDomain::current());
        let driver = Arc::new(TickerDriver::new(config));
        let job = reg
            .create(JobSpec::new("tick0"), driver.clone(), SchedulingDomain::current(), None)
            .unwrap();
        (reg, driver, job)
    }

    async fn wait_status(job: &Job, status: JobStatus) {
        job.watch_status()
            .wait_for(|s| *s == status)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_through_all_steps_and_commits() {
        let (reg, driver, job) = spawn(TickerConfig {
            steps: 3,
            step_ms: 1000,
            ..TickerConfig::default()
        });
        job.start();
        assert_eq!(job.wait_until_completed().await, 0);
        wait_status(&job, JobStatus::Null).await;

        let progress = job.progress();
        assert_eq!((progress.current, progress.total), (3, 3));
        assert_eq!(driver.calls(), vec!["prepare", "commit", "clean", "free"]);
        assert!(reg.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_step_aborts() {
        let (_reg, driver, job) = spawn(TickerConfig {
            steps: 3,
            fail_at: Some(1),
            ..TickerConfig::default()
        });
        job.start();
        assert_eq!(job.wait_until_completed().await, RESULT_FAILED);
        wait_status(&job, JobStatus::Null).await;

        assert_eq!(job.error().as_deref(), Some("step 1 failed"));
        assert_eq!(job.progress().current, 1);
        assert_eq!(driver.calls(), vec!["abort", "clean", "free"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_in_ready_until_completed() {
        let (_reg, driver, job) = spawn(TickerConfig {
            steps: 2,
            wait_for_complete: true,
            ..TickerConfig::default()
        });
        job.start();
        wait_status(&job, JobStatus::Ready).await;
        assert_eq!(job.complete_sync().await, Ok(0));
        wait_status(&job, JobStatus::Null).await;
        assert!(driver.calls().contains(&"commit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_cancel_when_ready_completes_cleanly() {
        let (_reg, driver, job) = spawn(TickerConfig {
            steps: 1,
            wait_for_complete: true,
            ..TickerConfig::default()
        });
        job.start();
        wait_status(&job, JobStatus::Ready).await;
        assert_eq!(job.cancel_sync(false).await, 0);
        wait_status(&job, JobStatus::Null).await;
        assert!(driver.calls().contains(&"commit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_cancel_mid_run() {
        let (_reg, driver, job) = spawn(TickerConfig {
            steps: 100,
            step_ms: 60_000,
            ..TickerConfig::default()
        });
        job.start();
        tokio::task::yield_now().await;
        assert_eq!(job.cancel_sync(true).await, RESULT_CANCELLED);
        wait_status(&job, JobStatus::Null).await;
        assert!(job.progress().current < 100);
        assert_eq!(job.error().as_deref(), Some("operation cancelled"));
        assert_eq!(driver.calls(), vec!["abort", "clean", "free"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_pause_runs_driver_pause_hooks() {
        let (_reg, driver, job) = spawn(TickerConfig {
            steps: 3,
            step_ms: 10_000,
            ..TickerConfig::default()
        });
        job.start();
        tokio::task::yield_now().await;

        job.user_pause().unwrap();
        wait_status(&job, JobStatus::Paused).await;
        job.user_set_speed(4096).unwrap();
        assert_eq!(driver.speed(), 4096);

        job.user_resume().unwrap();
        wait_status(&job, JobStatus::Null).await;

        let calls = driver.calls();
        let pause = calls.iter().position(|c| *c == "pause").unwrap();
        let user_resume = calls.iter().position(|c| *c == "user_resume").unwrap();
        let resume = calls.iter().position(|c| *c == "resume").unwrap();
        assert!(pause < user_resume && user_resume < resume);
    }

    #[tokio::test]
    async fn test_drain_kicks_the_driver() {
        let (_reg, driver, job) = spawn(TickerConfig::default());
        job.drain();
        assert_eq!(driver.calls(), vec!["drain"]);
        job.early_fail();
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: TickerConfig = serde_json::from_str(r#"{"steps": 5}"#).unwrap();
        assert_eq!(config.steps, 5);
        assert_eq!(config.step_ms, 100);
        assert!(!config.wait_for_complete);
        assert_eq!(config.fail_at, None);
    }
}
