//! Chain tests — end-to-end with mocks.
//!
//! Each test follows MOCK → FUNCTION → OUTPUT: set up the fake external
//! world, run the actual jobs, assert what landed in the catalog, the queue,
//! and the monitor. We never reach into a job and call its internals.

use std::sync::Arc;

use techfeed_common::RunId;

use crate::jobs::{CollectPostsJob, PersistPostsJob, RUN_ID_PARAM};
use crate::monitor::CollectMonitor;
use crate::persist::PersistStage;
use crate::registry::SourceRegistry;
use crate::runner::{Job, JobParams};
use crate::staging::StagingQueue;
use crate::testing::*;

const CHUNK_SIZE: usize = 2;

struct World {
    registry: Arc<SourceRegistry>,
    catalog: Arc<MemoryCatalog>,
    queue: StagingQueue,
    monitor: CollectMonitor,
}

impl World {
    fn new(adapters: Vec<ScriptedAdapter>, blogs: Vec<techfeed_common::TechBlogKey>) -> Self {
        let registry = Arc::new(SourceRegistry::from_adapters(
            adapters
                .into_iter()
                .map(|a| Arc::new(a) as Arc<dyn crate::sources::SourceAdapter>)
                .collect(),
        ));
        Self {
            registry,
            catalog: Arc::new(MemoryCatalog::new(blogs)),
            queue: StagingQueue::new(Arc::new(MemoryListStore::new())),
            monitor: CollectMonitor::new(),
        }
    }

    fn collect_job(&self) -> CollectPostsJob {
        CollectPostsJob::new(
            self.registry.clone(),
            self.catalog.clone(),
            self.queue.clone(),
            self.monitor.clone(),
            None,
        )
    }

    fn persist_job(&self) -> PersistPostsJob {
        PersistPostsJob::new(PersistStage::new(
            self.queue.clone(),
            self.catalog.clone(),
            self.monitor.clone(),
            CHUNK_SIZE,
        ))
    }

    async fn run_collect(&self, run_id: RunId) {
        self.collect_job()
            .run(JobParams::new().with(RUN_ID_PARAM, run_id.to_string()))
            .await
            .expect("collect job");
    }

    async fn run_persist(&self, run_id: RunId) {
        self.persist_job()
            .run(JobParams::new().with(RUN_ID_PARAM, run_id.to_string()))
            .await
            .expect("persist job");
    }
}

// ---------------------------------------------------------------------------
// Chain 1: fetch across sources — failures are source-isolated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_source_does_not_block_the_others() {
    let world = World::new(
        vec![
            ScriptedAdapter::succeeding("kakao", vec![record("k1"), record("k2"), record("k3")]),
            ScriptedAdapter::failing("toss", "resultType FAIL at page 0"),
        ],
        vec![tech_blog(1, "kakao"), tech_blog(2, "toss")],
    );
    let run_id = RunId::from_millis(100);

    world.run_collect(run_id).await;

    // kakao staged, toss recorded as a failure, nothing more.
    assert_eq!(world.queue.len(run_id).await.unwrap(), 1);
    let snapshot = world.monitor.latest().unwrap();
    assert_eq!(snapshot.total_fetched, 3);
    assert_eq!(snapshot.failed_sources, 1);
    let toss = snapshot.sources.iter().find(|s| s.source == "toss").unwrap();
    assert!(toss.error.as_ref().unwrap().contains("resultType FAIL"));
}

#[tokio::test]
async fn blog_without_adapter_is_recorded_not_fatal() {
    let world = World::new(
        vec![ScriptedAdapter::succeeding("kakao", vec![record("k1")])],
        vec![tech_blog(1, "kakao"), tech_blog(2, "ghost")],
    );
    let run_id = RunId::from_millis(101);

    world.run_collect(run_id).await;

    let snapshot = world.monitor.latest().unwrap();
    assert_eq!(snapshot.total_fetched, 1);
    let ghost = snapshot.sources.iter().find(|s| s.source == "ghost").unwrap();
    assert!(ghost.error.as_ref().unwrap().contains("No source adapter"));
}

// ---------------------------------------------------------------------------
// Chain 2: full run — fetch, stage, persist
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_run_lands_posts_and_tags_in_the_catalog() {
    let world = World::new(
        vec![ScriptedAdapter::succeeding(
            "kakao",
            vec![
                record_with_tags("k1", &["Kafka", "infra"]),
                record_with_tags("k2", &["kafka"]),
                record("k3"),
            ],
        )],
        vec![tech_blog(1, "kakao")],
    );
    let run_id = RunId::from_millis(200);

    world.run_collect(run_id).await;
    world.run_persist(run_id).await;

    assert_eq!(world.catalog.post_count_for(1), 3);
    // "Kafka" and "kafka" normalize to one tag.
    assert_eq!(world.catalog.tag_count(), 2);
    assert_eq!(world.queue.len(run_id).await.unwrap(), 0);

    let snapshot = world.monitor.latest().unwrap();
    let kakao = snapshot.sources.iter().find(|s| s.source == "kakao").unwrap();
    assert_eq!(kakao.fetched, 3);
    assert_eq!(kakao.added, 3);
}

#[tokio::test]
async fn second_run_against_populated_blog_inserts_nothing() {
    let world = World::new(
        vec![ScriptedAdapter::succeeding(
            "kakao",
            vec![record_with_tags("k1", &["rust"]), record("k2")],
        )],
        vec![tech_blog(1, "kakao")],
    );

    let first = RunId::from_millis(300);
    world.run_collect(first).await;
    world.run_persist(first).await;
    assert_eq!(world.catalog.post_count(), 2);
    assert_eq!(world.catalog.tag_count(), 1);

    // Same publisher, next run: the initialization guard skips everything.
    let second = RunId::from_millis(301);
    world.run_collect(second).await;
    world.run_persist(second).await;

    assert_eq!(world.catalog.post_count(), 2);
    assert_eq!(world.catalog.tag_count(), 1);
    assert_eq!(world.queue.len(second).await.unwrap(), 0);
    let snapshot = world.monitor.latest().unwrap();
    let kakao = snapshot.sources.iter().find(|s| s.source == "kakao").unwrap();
    assert_eq!(kakao.added, 0);
}

// ---------------------------------------------------------------------------
// Chain 3: chunk isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_chunk_is_skipped_and_the_rest_still_lands() {
    // 5 single-post batches, chunk size 2 → chunks of 2/2/1.
    let world = World::new(
        vec![ScriptedAdapter::succeeding(
            "kakao",
            (0..5).map(|i| record(&format!("k{i}"))).collect(),
        )],
        vec![tech_blog(1, "kakao")],
    );
    let run_id = RunId::from_millis(400);

    // Stage as five separate batches so the chunking is visible.
    for i in 0..5 {
        world
            .queue
            .push(
                run_id,
                &[techfeed_common::StagedBatch {
                    tech_blog_id: 1,
                    source: "kakao".to_string(),
                    posts: vec![record(&format!("k{i}"))],
                }],
            )
            .await
            .unwrap();
    }

    world.catalog.fail_next_write();
    world.run_persist(run_id).await;

    // First chunk (2 posts) rolled back and was not re-queued; the other
    // three posts committed. At-most-once per drained item.
    assert_eq!(world.catalog.post_count(), 3);
    assert_eq!(world.queue.len(run_id).await.unwrap(), 0);
    let snapshot = world.monitor.latest().unwrap();
    let kakao = snapshot.sources.iter().find(|s| s.source == "kakao").unwrap();
    assert_eq!(kakao.added, 3);
}

// ---------------------------------------------------------------------------
// Chain 4: aborted-run leftovers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collect_clears_leftover_items_under_its_key() {
    let world = World::new(
        vec![ScriptedAdapter::succeeding("kakao", vec![record("fresh")])],
        vec![tech_blog(1, "kakao")],
    );
    let run_id = RunId::from_millis(500);

    // A crashed prior run left stale items under the same key.
    world
        .queue
        .push(
            run_id,
            &[techfeed_common::StagedBatch {
                tech_blog_id: 1,
                source: "kakao".to_string(),
                posts: vec![record("stale")],
            }],
        )
        .await
        .unwrap();

    world.run_collect(run_id).await;
    world.run_persist(run_id).await;

    assert_eq!(world.catalog.post_keys_for(1), vec!["fresh".to_string()]);
}
