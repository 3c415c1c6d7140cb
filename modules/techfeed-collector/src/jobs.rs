// The two batch jobs a collection run consists of. Both take the run id as
// a string parameter; the id itself is always minted by the trigger side.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use techfeed_common::{RunId, StagedBatch, TechBlogKey};

use crate::monitor::CollectMonitor;
use crate::persist::PersistStage;
use crate::registry::SourceRegistry;
use crate::runner::{Job, JobParams};
use crate::staging::StagingQueue;
use crate::traits::Catalog;

pub const COLLECT_JOB: &str = "collect-posts";
pub const PERSIST_JOB: &str = "persist-posts";
pub const RUN_ID_PARAM: &str = "runId";

/// Publishers collected in parallel within one fetch job.
const SOURCE_CONCURRENCY: usize = 4;
/// Posts per staged batch item.
const STAGE_BATCH_SIZE: usize = 50;

fn run_id_param(params: &JobParams) -> Result<RunId> {
    let raw = params
        .get(RUN_ID_PARAM)
        .with_context(|| format!("{RUN_ID_PARAM} parameter is required"))?;
    let millis: i64 = raw
        .parse()
        .with_context(|| format!("{RUN_ID_PARAM} must be numeric, got {raw:?}"))?;
    Ok(RunId::from_millis(millis))
}

// ---------------------------------------------------------------------------
// Fetch job
// ---------------------------------------------------------------------------

pub struct CollectPostsJob {
    registry: Arc<SourceRegistry>,
    catalog: Arc<dyn Catalog>,
    queue: StagingQueue,
    monitor: CollectMonitor,
    limit: Option<usize>,
}

impl CollectPostsJob {
    pub fn new(
        registry: Arc<SourceRegistry>,
        catalog: Arc<dyn Catalog>,
        queue: StagingQueue,
        monitor: CollectMonitor,
        limit: Option<usize>,
    ) -> Self {
        Self {
            registry,
            catalog,
            queue,
            monitor,
            limit,
        }
    }

    /// Collect one publisher and stage its posts. Failures are recorded per
    /// source and never propagate — one bad publisher must not block the
    /// rest of the run.
    async fn collect_source(&self, run_id: RunId, blog: &TechBlogKey) {
        let adapter = match self.registry.get(&blog.key) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(source = blog.key.as_str(), error = %e, "collect: no adapter");
                self.monitor.record_failure(run_id, &blog.key, &e.to_string());
                return;
            }
        };

        match adapter.fetch_posts(self.limit).await {
            Ok(posts) => {
                let fetched = posts.len() as u32;
                for chunk in posts.chunks(STAGE_BATCH_SIZE) {
                    let batch = StagedBatch {
                        tech_blog_id: blog.id,
                        source: blog.key.clone(),
                        posts: chunk.to_vec(),
                    };
                    if let Err(e) = self.queue.push(run_id, std::slice::from_ref(&batch)).await {
                        warn!(source = blog.key.as_str(), error = %e, "collect: staging push failed");
                        self.monitor.record_failure(run_id, &blog.key, &e.to_string());
                        return;
                    }
                }
                info!(source = blog.key.as_str(), fetched, "collect: source staged");
                self.monitor.record_success(run_id, &blog.key, fetched);
            }
            Err(e) => {
                warn!(source = blog.key.as_str(), error = %e, "collect: source failed");
                self.monitor
                    .record_failure(run_id, &blog.key, &format!("{e:#}"));
            }
        }
    }
}

#[async_trait]
impl Job for CollectPostsJob {
    fn name(&self) -> &'static str {
        COLLECT_JOB
    }

    async fn run(&self, params: JobParams) -> Result<()> {
        let run_id = run_id_param(&params)?;
        let blogs = self.catalog.list_tech_blogs().await?;
        info!(run_id = %run_id, sources = blogs.len(), "collect: run starting");

        // A previously aborted run may have left items under this key.
        self.queue.reset(run_id).await?;

        stream::iter(blogs.iter())
            .for_each_concurrent(SOURCE_CONCURRENCY, |blog| self.collect_source(run_id, blog))
            .await;

        info!(run_id = %run_id, "collect: run finished");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persist job
// ---------------------------------------------------------------------------

pub struct PersistPostsJob {
    stage: PersistStage,
}

impl PersistPostsJob {
    pub fn new(stage: PersistStage) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl Job for PersistPostsJob {
    fn name(&self) -> &'static str {
        PERSIST_JOB
    }

    async fn run(&self, params: JobParams) -> Result<()> {
        let run_id = run_id_param(&params)?;
        self.stage.run(run_id).await
    }
}
