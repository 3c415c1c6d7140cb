// Single-lane batch job dispatcher: unbounded in-process buffer, one
// background worker, strict submission order. This is the mechanism that
// keeps two collection runs from contending over staging keys or minting
// duplicate run ids.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::{CollectError, Result};

/// String-keyed parameters carried alongside a job submission.
#[derive(Debug, Clone, Default)]
pub struct JobParams(HashMap<String, String>);

impl JobParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, params: JobParams) -> anyhow::Result<()>;
}

struct QueuedJob {
    job: Arc<dyn Job>,
    params: JobParams,
}

pub struct JobRunner {
    jobs: HashMap<String, Arc<dyn Job>>,
    tx: mpsc::UnboundedSender<QueuedJob>,
}

impl JobRunner {
    /// Register the job set and spawn the worker. Submissions buffer
    /// unbounded and execute one at a time in order.
    pub fn start(jobs: Vec<Arc<dyn Job>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedJob>();

        tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                let name = queued.job.name();
                info!(job = name, "batch job starting");
                match queued.job.run(queued.params).await {
                    Ok(()) => info!(job = name, "batch job finished"),
                    Err(e) => error!(job = name, error = %e, "batch job failed"),
                }
            }
        });

        let jobs = jobs
            .into_iter()
            .map(|job| (job.name().to_string(), job))
            .collect();
        Self { jobs, tx }
    }

    /// Enqueue a job by name. An unregistered name is a synchronous client
    /// error and never reaches the queue.
    pub fn submit(&self, name: &str, params: JobParams) -> Result<()> {
        let job = self
            .jobs
            .get(name)
            .cloned()
            .ok_or_else(|| CollectError::UnknownJob(name.to_string()))?;
        self.tx
            .send(QueuedJob { job, params })
            .map_err(|_| CollectError::RunnerClosed)
    }

    pub fn has_job(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct RecordingJob {
        name: &'static str,
        delay: Duration,
        log: Arc<Mutex<Vec<String>>>,
        done: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl Job for RecordingJob {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, params: JobParams) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:start", self.name));
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(format!(
                "{}:end:{}",
                self.name,
                params.get("runId").unwrap_or("-")
            ));
            let _ = self.done.send(());
            Ok(())
        }
    }

    #[tokio::test]
    async fn executes_strictly_one_at_a_time_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done, mut finished) = mpsc::unbounded_channel();
        let runner = JobRunner::start(vec![
            Arc::new(RecordingJob {
                name: "slow",
                delay: Duration::from_millis(50),
                log: log.clone(),
                done: done.clone(),
            }),
            Arc::new(RecordingJob {
                name: "fast",
                delay: Duration::from_millis(0),
                log: log.clone(),
                done: done.clone(),
            }),
        ]);

        runner
            .submit("slow", JobParams::new().with("runId", "1"))
            .unwrap();
        runner
            .submit("fast", JobParams::new().with("runId", "1"))
            .unwrap();

        finished.recv().await.unwrap();
        finished.recv().await.unwrap();

        let log = log.lock().unwrap().clone();
        // "fast" must not start until "slow" has ended, despite the sleep.
        assert_eq!(log, vec!["slow:start", "slow:end:1", "fast:start", "fast:end:1"]);
    }

    #[tokio::test]
    async fn unknown_job_is_rejected_synchronously() {
        let runner = JobRunner::start(vec![]);
        let err = runner.submit("nope", JobParams::new()).unwrap_err();
        assert!(matches!(err, CollectError::UnknownJob(_)));
    }
}
