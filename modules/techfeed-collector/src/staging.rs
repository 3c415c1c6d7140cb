// Run-scoped staging buffer between fetch and persist, on top of shared
// key-value list primitives. The queue holds no database transaction; it is
// what absorbs fetch latency and bursts that a transaction must not.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use techfeed_common::{RunId, StagedBatch};

use crate::error::{CollectError, Result};

const STAGING_KEY_PREFIX: &str = "TECH_BLOG:FETCHED_POSTS:";

/// Composite key for one run's staging list. Keeps run-scoped entries from
/// colliding with unrelated shared-store usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingKey(RunId);

impl StagingKey {
    pub fn new(run_id: RunId) -> Self {
        Self(run_id)
    }
}

impl std::fmt::Display for StagingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{STAGING_KEY_PREFIX}{}", self.0)
    }
}

/// The list primitives the staging queue consumes. The shared store itself
/// (connection handling, eviction, locking) is someone else's problem.
#[async_trait]
pub trait ListStore: Send + Sync {
    async fn push_many(&self, key: &str, items: Vec<String>) -> Result<()>;
    async fn pop(&self, key: &str) -> Result<Option<String>>;
    async fn len(&self, key: &str) -> Result<u64>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub struct RedisListStore {
    conn: ConnectionManager,
}

impl RedisListStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ListStore for RedisListStore {
    async fn push_many(&self, key: &str, items: Vec<String>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(key, items).await?;
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let item: Option<String> = conn.lpop(key, None).await?;
        Ok(item)
    }

    async fn len(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(key).await?;
        Ok(len)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// Append-at-tail / pop-from-head buffer of serialized post batches for one
/// run.
#[derive(Clone)]
pub struct StagingQueue {
    store: Arc<dyn ListStore>,
}

impl StagingQueue {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        Self { store }
    }

    /// Clear any pre-existing contents for this run's key. The fetch stage
    /// calls this before its first write in case an aborted run left items
    /// behind on reused infrastructure.
    pub async fn reset(&self, run_id: RunId) -> Result<()> {
        let key = StagingKey::new(run_id).to_string();
        self.store.delete(&key).await?;
        debug!(%key, "staging: reset");
        Ok(())
    }

    pub async fn push(&self, run_id: RunId, batches: &[StagedBatch]) -> Result<()> {
        let key = StagingKey::new(run_id).to_string();
        let items = batches
            .iter()
            .map(|b| serde_json::to_string(b).map_err(|e| CollectError::Queue(e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        self.store.push_many(&key, items).await
    }

    /// Pop up to `max` batches, stopping early when the list runs dry. A
    /// batch that fails to deserialize is logged and dropped — it cannot be
    /// retried and must not wedge the run.
    pub async fn drain(&self, run_id: RunId, max: usize) -> Result<Vec<StagedBatch>> {
        let key = StagingKey::new(run_id).to_string();
        let mut batches = Vec::new();
        while batches.len() < max {
            let Some(raw) = self.store.pop(&key).await? else {
                break;
            };
            match serde_json::from_str::<StagedBatch>(&raw) {
                Ok(batch) => batches.push(batch),
                Err(e) => warn!(%key, error = %e, "staging: dropping undecodable item"),
            }
        }
        Ok(batches)
    }

    pub async fn len(&self, run_id: RunId) -> Result<u64> {
        let key = StagingKey::new(run_id).to_string();
        self.store.len(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, MemoryListStore};

    fn batch(source: &str, keys: &[&str]) -> StagedBatch {
        StagedBatch {
            tech_blog_id: 1,
            source: source.to_string(),
            posts: keys.iter().map(|k| record(k)).collect(),
        }
    }

    #[test]
    fn staging_key_renders_prefix_and_run() {
        let key = StagingKey::new(RunId::from_millis(100));
        assert_eq!(key.to_string(), "TECH_BLOG:FETCHED_POSTS:100");
    }

    #[tokio::test]
    async fn drain_respects_max_and_leaves_the_rest() {
        let queue = StagingQueue::new(Arc::new(MemoryListStore::new()));
        let run = RunId::from_millis(100);
        let batches: Vec<StagedBatch> =
            (0..5).map(|i| batch("kakao", &[&format!("p{i}")])).collect();
        queue.push(run, &batches).await.unwrap();

        let first = queue.drain(run, 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(queue.len(run).await.unwrap(), 2);

        let second = queue.drain(run, 3).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(queue.len(run).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_clears_leftovers_from_an_aborted_run() {
        let queue = StagingQueue::new(Arc::new(MemoryListStore::new()));
        let run = RunId::from_millis(7);
        queue.push(run, &[batch("toss", &["a"])]).await.unwrap();
        queue.reset(run).await.unwrap();
        assert_eq!(queue.len(run).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn runs_do_not_share_lists() {
        let queue = StagingQueue::new(Arc::new(MemoryListStore::new()));
        queue
            .push(RunId::from_millis(1), &[batch("kakao", &["a"])])
            .await
            .unwrap();
        assert_eq!(queue.len(RunId::from_millis(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batches_round_trip_through_serialization() {
        let queue = StagingQueue::new(Arc::new(MemoryListStore::new()));
        let run = RunId::from_millis(3);
        let pushed = batch("woowahan", &["x", "y"]);
        queue.push(run, std::slice::from_ref(&pushed)).await.unwrap();
        let drained = queue.drain(run, 10).await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].source, "woowahan");
        assert_eq!(drained[0].posts, pushed.posts);
    }
}
