//! Per-program minute-aligned tick scheduling
//!
//! Every enabled program owns one long-lived tick task that wakes on each
//! wall-clock minute boundary and re-evaluates the trigger condition. The
//! sleep is interruptible so disabling a program completes promptly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::evaluator;
use crate::manager::ProgramManager;
use crate::program::Program;

/// How long a stopping scheduler is given to yield before it is aborted
const STOP_DEADLINE: Duration = Duration::from_secs(1);

/// Handle to one program's running tick task
pub(crate) struct SchedulerHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the tick task to wind down without waiting for it
    pub(crate) fn signal(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Delay until the next wall-clock minute boundary
pub(crate) fn next_minute_delay(now: DateTime<Utc>) -> Duration {
    Duration::from_secs(u64::from(60 - now.second()))
}

/// Start a fresh tick task for the program, replacing any stale one
pub(crate) fn start(manager: &Arc<ProgramManager>, program: &Arc<Program>) {
    if let Some(stale) = program.take_scheduler() {
        stale.signal();
        stale.task.abort();
    }

    let (shutdown, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(tick_loop(manager.clone(), program.clone(), shutdown_rx));
    program.store_scheduler(SchedulerHandle { shutdown, task });
}

/// Stop the program's tick task: signal, join with a deadline, then abort
pub(crate) async fn stop(program: &Arc<Program>) {
    let Some(handle) = program.take_scheduler() else {
        return;
    };

    handle.signal();

    let mut task = handle.task;
    if tokio::time::timeout(STOP_DEADLINE, &mut task).await.is_err() {
        debug!(
            address = %program.address(),
            "Tick scheduler did not yield within deadline, aborting"
        );
        task.abort();
    }
}

async fn tick_loop(
    manager: Arc<ProgramManager>,
    program: Arc<Program>,
    mut shutdown: broadcast::Receiver<()>,
) {
    debug!(address = %program.address(), "Tick scheduler started");

    while manager.is_running() && program.is_enabled() {
        let delay = next_minute_delay(Utc::now());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => break,
        }

        if !manager.is_running() || !program.is_enabled() {
            break;
        }
        if !manager.is_enabled() || program.is_running() {
            continue;
        }

        evaluator::check_and_run(&manager, &program).await;
    }

    debug!(address = %program.address(), "Tick scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delay_at_minute_start() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 10, 15, 0).unwrap();
        assert_eq!(next_minute_delay(now), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_mid_minute() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 10, 15, 42).unwrap();
        assert_eq!(next_minute_delay(now), Duration::from_secs(18));
    }

    #[test]
    fn test_delay_at_last_second() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 10, 15, 59).unwrap();
        assert_eq!(next_minute_delay(now), Duration::from_secs(1));
    }
}
