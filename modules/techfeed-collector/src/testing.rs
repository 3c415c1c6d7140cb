// Test doubles for the collection pipeline, one per trait boundary:
// - MemoryListStore (ListStore) — VecDeque-backed staging lists
// - MemoryCatalog (Catalog) — stateful in-memory catalog with the same
//   tag/guard semantics as the Postgres store
// - ScriptedAdapter (SourceAdapter) — fixed posts or a scripted failure
// Plus small fixture builders.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use techfeed_catalog::{normalize_tag, ChunkReport};
use techfeed_common::{PostRecord, StagedBatch, TechBlogKey};

use crate::sources::SourceAdapter;
use crate::staging::ListStore;
use crate::traits::Catalog;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn record(key: &str) -> PostRecord {
    PostRecord {
        key: key.to_string(),
        title: format!("Post {key}"),
        description: String::new(),
        thumbnail_url: None,
        published_at: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        source_url: format!("https://blog.example.com/{key}"),
        tags: Vec::new(),
    }
}

pub fn record_with_tags(key: &str, tags: &[&str]) -> PostRecord {
    let mut post = record(key);
    post.tags = tags.iter().map(|t| t.to_string()).collect();
    post
}

pub fn tech_blog(id: i64, key: &str) -> TechBlogKey {
    TechBlogKey {
        id,
        key: key.to_string(),
        title: format!("{key} blog"),
    }
}

// ---------------------------------------------------------------------------
// MemoryListStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryListStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn push_many(&self, key: &str, items: Vec<String>) -> crate::error::Result<()> {
        let mut lists = self.lists.lock().unwrap();
        lists.entry(key.to_string()).or_default().extend(items);
        Ok(())
    }

    async fn pop(&self, key: &str) -> crate::error::Result<Option<String>> {
        let mut lists = self.lists.lock().unwrap();
        Ok(lists.get_mut(key).and_then(|list| list.pop_front()))
    }

    async fn len(&self, key: &str) -> crate::error::Result<u64> {
        let lists = self.lists.lock().unwrap();
        Ok(lists.get(key).map(|list| list.len() as u64).unwrap_or(0))
    }

    async fn delete(&self, key: &str) -> crate::error::Result<()> {
        self.lists.lock().unwrap().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCatalog
// ---------------------------------------------------------------------------

/// In-memory catalog mirroring the Postgres store's chunk semantics:
/// all-or-nothing chunks, tag dedup on the normalized title.
pub struct MemoryCatalog {
    blogs: Vec<TechBlogKey>,
    posts: Mutex<Vec<(i64, PostRecord)>>,
    tags: Mutex<HashSet<String>>,
    fail_next_write: AtomicBool,
}

impl MemoryCatalog {
    pub fn new(blogs: Vec<TechBlogKey>) -> Self {
        Self {
            blogs,
            posts: Mutex::new(Vec::new()),
            tags: Mutex::new(HashSet::new()),
            fail_next_write: AtomicBool::new(false),
        }
    }

    /// Make the next write_chunk fail (and roll back), once.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn post_count_for(&self, tech_blog_id: i64) -> usize {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == tech_blog_id)
            .count()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.lock().unwrap().len()
    }

    pub fn post_keys_for(&self, tech_blog_id: i64) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == tech_blog_id)
            .map(|(_, post)| post.key.clone())
            .collect()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_tech_blogs(&self) -> Result<Vec<TechBlogKey>> {
        Ok(self.blogs.clone())
    }

    async fn has_posts(&self, tech_blog_id: i64) -> Result<bool> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .any(|(id, _)| *id == tech_blog_id))
    }

    async fn write_chunk(&self, batches: &[StagedBatch]) -> Result<ChunkReport> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            anyhow::bail!("injected write failure");
        }

        let mut posts = self.posts.lock().unwrap();
        let mut tags = self.tags.lock().unwrap();
        let mut report = ChunkReport::default();

        for batch in batches {
            for post in &batch.posts {
                for tag in &post.tags {
                    let normalized = normalize_tag(tag);
                    if !normalized.is_empty() {
                        tags.insert(normalized);
                    }
                }
                posts.push((batch.tech_blog_id, post.clone()));
            }
            *report
                .added_by_source
                .entry(batch.source.clone())
                .or_insert(0) += batch.posts.len() as u32;
        }

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// ScriptedAdapter
// ---------------------------------------------------------------------------

/// Adapter returning a fixed post list, or failing every call.
pub struct ScriptedAdapter {
    key: &'static str,
    posts: Option<Vec<PostRecord>>,
    failure: Option<String>,
}

impl ScriptedAdapter {
    pub fn succeeding(key: &'static str, posts: Vec<PostRecord>) -> Self {
        Self {
            key,
            posts: Some(posts),
            failure: None,
        }
    }

    pub fn failing(key: &'static str, message: &str) -> Self {
        Self {
            key,
            posts: None,
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn key(&self) -> &'static str {
        self.key
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        match (&self.posts, &self.failure) {
            (Some(posts), _) => {
                let mut posts = posts.clone();
                if let Some(cap) = limit {
                    posts.truncate(cap);
                }
                Ok(posts)
            }
            (None, Some(message)) => anyhow::bail!("{}: {message}", self.key),
            (None, None) => Ok(Vec::new()),
        }
    }
}
