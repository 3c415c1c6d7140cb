//! Medium-hosted publications. Medium only exposes an RSS window — one
//! "page" of recent posts — so these adapters fetch once and are done; the
//! feed's categories become the post tags.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use techfeed_common::PostRecord;

use super::{strip_html, url_tail, SourceAdapter};
use crate::http::Http;

pub struct MediumAdapter {
    key: &'static str,
    feed_url: &'static str,
    http: Http,
}

pub fn daangn(http: Http) -> MediumAdapter {
    MediumAdapter::new("daangn", "https://medium.com/feed/daangn", http)
}

pub fn coupang(http: Http) -> MediumAdapter {
    MediumAdapter::new("coupang", "https://medium.com/feed/coupang-engineering", http)
}

pub fn watcha(http: Http) -> MediumAdapter {
    MediumAdapter::new("watcha", "https://medium.com/feed/watcha", http)
}

pub fn yanolja(http: Http) -> MediumAdapter {
    MediumAdapter::new("yanolja", "https://medium.com/feed/yanolja", http)
}

pub fn gmarket(http: Http) -> MediumAdapter {
    MediumAdapter::new("gmarket", "https://medium.com/feed/gmarket", http)
}

impl MediumAdapter {
    fn new(key: &'static str, feed_url: &'static str, http: Http) -> Self {
        Self { key, feed_url, http }
    }

    fn convert(&self, entry: feed_rs::model::Entry) -> Result<PostRecord> {
        let source_url = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
            .with_context(|| format!("{}: feed entry without link ({})", self.key, self.feed_url))?;
        // Strip Medium's tracking query before deriving the key.
        let canonical = source_url
            .split('?')
            .next()
            .unwrap_or(&source_url)
            .to_string();
        let key = url_tail(&canonical).with_context(|| {
            format!("{}: no key in {canonical} ({})", self.key, self.feed_url)
        })?;

        let title = entry
            .title
            .map(|t| t.content)
            .filter(|t| !t.is_empty())
            .with_context(|| format!("{}: entry {key} missing title ({})", self.key, self.feed_url))?;
        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| {
                format!("{}: entry {key} missing pub date ({})", self.key, self.feed_url)
            })?;

        let description = entry
            .summary
            .map(|s| strip_html(&s.content))
            .unwrap_or_default();
        let tags = entry
            .categories
            .into_iter()
            .map(|c| c.term)
            .filter(|t| !t.is_empty())
            .collect();

        Ok(PostRecord {
            key,
            title,
            description,
            thumbnail_url: None,
            published_at,
            source_url: canonical,
            tags,
        })
    }
}

#[async_trait]
impl SourceAdapter for MediumAdapter {
    fn key(&self) -> &'static str {
        self.key
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        let bytes = self.http.get_bytes(self.feed_url).await?;
        let feed = feed_rs::parser::parse(&bytes[..])
            .with_context(|| format!("{}: failed to parse feed {}", self.key, self.feed_url))?;

        let mut posts = feed
            .entries
            .into_iter()
            .map(|entry| self.convert(entry))
            .collect::<Result<Vec<_>>>()?;

        if let Some(cap) = limit {
            posts.truncate(cap);
        }
        Ok(posts)
    }
}
