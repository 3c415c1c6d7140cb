// Persistence stage: chunked consumer of the run-scoped staging queue.
// One chunk, one transaction; a failed chunk is logged and skipped so a
// long batch keeps moving. Drained-but-uncommitted batches are not pushed
// back — at-most-once per drained item, accepted and documented.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use techfeed_common::{RunId, StagedBatch};

use crate::monitor::CollectMonitor;
use crate::staging::StagingQueue;
use crate::traits::Catalog;

pub struct PersistStage {
    queue: StagingQueue,
    catalog: Arc<dyn Catalog>,
    monitor: CollectMonitor,
    chunk_size: usize,
}

impl PersistStage {
    pub fn new(
        queue: StagingQueue,
        catalog: Arc<dyn Catalog>,
        monitor: CollectMonitor,
        chunk_size: usize,
    ) -> Self {
        Self {
            queue,
            catalog,
            monitor,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Drain the run's queue until empty. Resumable: whatever a failed
    /// invocation leaves unconsumed is picked up by the next tick.
    pub async fn run(&self, run_id: RunId) -> Result<()> {
        // Guard verdicts are cached for the whole run: once this run starts
        // inserting for a blog, has_posts flips true and must not retire the
        // blog's remaining chunks.
        let mut cleared: HashSet<i64> = HashSet::new();
        let mut skipped: HashSet<i64> = HashSet::new();
        let mut chunks = 0u32;

        loop {
            let chunk = self.queue.drain(run_id, self.chunk_size).await?;
            if chunk.is_empty() {
                break;
            }
            chunks += 1;

            let batches = self
                .apply_guard(run_id, chunk, &mut cleared, &mut skipped)
                .await;
            if batches.is_empty() {
                continue;
            }

            match self.catalog.write_chunk(&batches).await {
                Ok(report) => {
                    for (source, added) in report.added_by_source {
                        self.monitor.accumulate_added(run_id, &source, added);
                    }
                }
                Err(e) => {
                    warn!(run_id = %run_id, error = %e,
                        "persist: chunk rolled back, continuing with next chunk");
                }
            }
        }

        info!(run_id = %run_id, chunks, "persist: queue drained");
        Ok(())
    }

    /// Idempotency at tech-blog granularity: a publisher that already has
    /// any post in the catalog is skipped for the entire run.
    async fn apply_guard(
        &self,
        run_id: RunId,
        chunk: Vec<StagedBatch>,
        cleared: &mut HashSet<i64>,
        skipped: &mut HashSet<i64>,
    ) -> Vec<StagedBatch> {
        let mut kept = Vec::with_capacity(chunk.len());
        for batch in chunk {
            if skipped.contains(&batch.tech_blog_id) {
                continue;
            }
            if !cleared.contains(&batch.tech_blog_id) {
                match self.catalog.has_posts(batch.tech_blog_id).await {
                    Ok(true) => {
                        info!(run_id = %run_id, source = batch.source.as_str(),
                            "persist: publisher already populated, skipping for this run");
                        skipped.insert(batch.tech_blog_id);
                        continue;
                    }
                    Ok(false) => {
                        cleared.insert(batch.tech_blog_id);
                    }
                    Err(e) => {
                        warn!(run_id = %run_id, source = batch.source.as_str(), error = %e,
                            "persist: guard check failed, dropping batch");
                        continue;
                    }
                }
            }
            kept.push(batch);
        }
        kept
    }
}
