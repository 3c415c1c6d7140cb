// Collection cadence. One run = the fetch job followed by the persist job,
// both carrying the same freshly minted RunId; the runner's single lane
// keeps them ordered.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use techfeed_collector::{JobParams, JobRunner, COLLECT_JOB, PERSIST_JOB, RUN_ID_PARAM};
use techfeed_common::RunId;

/// Enqueue one full collection run. The RunId is always minted here, never
/// taken from a caller.
pub fn trigger_collection(runner: &JobRunner) -> techfeed_collector::Result<RunId> {
    let run_id = RunId::allocate();
    let params = JobParams::new().with(RUN_ID_PARAM, run_id.to_string());
    runner.submit(COLLECT_JOB, params.clone())?;
    runner.submit(PERSIST_JOB, params)?;
    Ok(run_id)
}

/// Spawn the fixed-cadence collection loop.
pub fn start(runner: Arc<JobRunner>, interval_hours: u64) {
    if interval_hours == 0 {
        info!("scheduler: disabled (COLLECT_INTERVAL_HOURS=0)");
        return;
    }

    info!(interval_hours, "scheduler: starting collection loop");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 3600));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the first real run waits one period.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match trigger_collection(&runner) {
                Ok(run_id) => info!(run_id = %run_id, "scheduler: collection run enqueued"),
                Err(e) => error!(error = %e, "scheduler: failed to enqueue collection run"),
            }
        }
    });
}
