use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One externally sourced article, normalized, prior to persistence.
///
/// `key` is supplied by the publisher (slug, numeric id, or URL tail) and is
/// unique within one publisher only. It is the sole dedup and join identity;
/// it is never generated on our side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostRecord {
    pub key: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source_url: String,
    pub tags: Vec<String>,
}

/// Identity of a publisher to collect: the catalog row id plus the adapter
/// lookup key. Loaded once from the catalog at fetch-job start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechBlogKey {
    pub id: i64,
    pub key: String,
    pub title: String,
}

/// The unit pushed onto and popped from the staging list: one publisher's
/// posts, chunked. Serialized as JSON on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedBatch {
    pub tech_blog_id: i64,
    pub source: String,
    pub posts: Vec<PostRecord>,
}

static LAST_RUN_ID: AtomicI64 = AtomicI64::new(0);

/// Run-unique identifier scoping one collection execution: the staging list
/// key and the monitor snapshot. Never persisted to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i64);

impl RunId {
    /// Allocate a new run id from wall-clock millis, bumped past the previous
    /// allocation so two triggers in the same millisecond stay distinct.
    pub fn allocate() -> Self {
        let now = Utc::now().timestamp_millis();
        let mut prev = LAST_RUN_ID.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match LAST_RUN_ID.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return RunId(next),
                Err(observed) => prev = observed,
            }
        }
    }

    pub fn from_millis(millis: i64) -> Self {
        RunId(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_strictly_increasing() {
        let a = RunId::allocate();
        let b = RunId::allocate();
        let c = RunId::allocate();
        assert!(b.as_millis() > a.as_millis());
        assert!(c.as_millis() > b.as_millis());
    }
}
