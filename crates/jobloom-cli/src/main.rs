//! jobloom CLI
//!
//! TickerDriver のジョブをいくつか走らせ、指定に応じて pause / cancel / complete /
//! finalize / dismiss の verb を投げながら、ステータスイベントを表示するデモ。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, warn};

use jobloom_core::impls::{TickerConfig, TickerDriver};
use jobloom_core::{Job, JobEvent, JobFlags, JobRegistry, JobSpec, JobStatus, SchedulingDomain};

/// Run demo jobs through the lifecycle engine.
#[derive(Parser, Debug)]
#[command(name = "jobloom", version, about)]
struct Cli {
    /// Number of jobs to run side by side.
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Steps each job ticks through.
    #[arg(long, default_value_t = 10)]
    steps: u64,

    /// Milliseconds per step.
    #[arg(long, default_value_t = 100)]
    step_ms: u64,

    /// Park finished jobs in Ready until the Complete verb.
    #[arg(long)]
    wait_for_complete: bool,

    /// Fail every job at this step.
    #[arg(long)]
    fail_at: Option<u64>,

    /// Finalize and dismiss jobs by explicit verbs.
    #[arg(long)]
    manual: bool,

    /// Pause all jobs after this many milliseconds.
    #[arg(long)]
    pause_after_ms: Option<u64>,

    /// How long a pause lasts.
    #[arg(long, default_value_t = 500)]
    pause_for_ms: u64,

    /// Cancel all jobs after this many milliseconds.
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Issue soft cancels instead of forced ones.
    #[arg(long)]
    soft_cancel: bool,

    /// Print events and the final report as JSON lines.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn ticker(&self) -> TickerConfig {
        TickerConfig {
            steps: self.steps,
            step_ms: self.step_ms,
            wait_for_complete: self.wait_for_complete,
            fail_at: self.fail_at,
        }
    }

    fn flags(&self) -> JobFlags {
        if self.manual {
            JobFlags::manual()
        } else {
            JobFlags::default()
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<JobEvent>, json: bool) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if json {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(err) => warn!(error = %err, "cannot encode event"),
                    }
                } else {
                    let JobEvent::StatusChange { id, status } = event;
                    println!("{id}: {status}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "event printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Issue the verbs the command line asked for, then wait for every job.
async fn drive(cli: &Cli, jobs: &[Arc<Job>]) -> anyhow::Result<()> {
    if let Some(after) = cli.pause_after_ms {
        sleep(Duration::from_millis(after)).await;
        for job in jobs {
            if let Err(err) = job.user_pause() {
                warn!(job = %job.label(), error = %err, "pause refused");
            }
        }
        sleep(Duration::from_millis(cli.pause_for_ms)).await;
        for job in jobs {
            if job.is_user_paused() {
                job.user_resume()?;
            }
        }
    }

    if let Some(after) = cli.cancel_after_ms {
        sleep(Duration::from_millis(after)).await;
        for job in jobs {
            if let Err(err) = job.user_cancel(!cli.soft_cancel) {
                warn!(job = %job.label(), error = %err, "cancel refused");
            }
        }
    }

    for job in jobs {
        if cli.wait_for_complete {
            let mut status = job.watch_status();
            status
                .wait_for(|s| s.is_ready() || s.is_completed())
                .await
                .context("job status channel closed")?;
            if job.is_ready() && !job.cancel_requested() {
                job.complete_sync().await?;
            }
        }
        job.wait_until_completed().await;
    }

    if cli.manual {
        for job in jobs {
            if job.status() == JobStatus::Pending {
                job.user_finalize()?;
            }
            if job.status() == JobStatus::Concluded {
                job.user_dismiss()?;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = JobRegistry::new(SchedulingDomain::current());
    let printer = tokio::spawn(print_events(registry.subscribe(), cli.json));

    let mut jobs = Vec::with_capacity(cli.jobs);
    for n in 0..cli.jobs {
        let driver = Arc::new(TickerDriver::new(cli.ticker()));
        let spec = JobSpec::new(format!("job{n}")).with_flags(cli.flags());
        let job = registry.create(spec, driver, SchedulingDomain::current(), None)?;
        job.start();
        jobs.push(job);
    }

    tokio::select! {
        outcome = drive(&cli, &jobs) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling all jobs");
            registry.cancel_all_sync().await;
        }
    }

    // let the printer drain the last events
    tokio::task::yield_now().await;
    printer.abort();

    let mut failed = 0;
    for job in &jobs {
        let report = job.info();
        if job.result() != 0 {
            failed += 1;
        }
        if cli.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!(
                "{}: {} result={} progress={}/{}{}",
                job.label(),
                report.status,
                job.result(),
                report.current_progress,
                report.total_progress,
                report.error.map(|e| format!(" error={e}")).unwrap_or_default(),
            );
        }
    }
    info!(jobs = jobs.len(), failed, "done");
    anyhow::ensure!(failed == 0, "{failed} job(s) did not succeed");
    Ok(())
}
