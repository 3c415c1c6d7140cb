//! KakaoBank Tech — JSON listing without tags; tags come from a per-post
//! detail fetch. The detail fan-out is bounded and best-effort: a failed
//! detail request leaves the post tagless, it never fails the post.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::warn;

use techfeed_common::PostRecord;

use super::{parse_kst_date, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const LIST_URL: &str = "https://tech.kakaobank.com/api/posts";
const FIRST_PAGE: u32 = 1;
const ENRICH_CONCURRENCY: usize = 6;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    slug: Option<String>,
    title: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(rename = "coverImage")]
    cover_image: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Detail {
    #[serde(default)]
    tags: Vec<String>,
}

pub struct KakaoBankAdapter {
    http: Http,
}

impl KakaoBankAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }

    /// Fetch tags from each post's detail endpoint, merged back by key.
    async fn enrich_tags(&self, posts: Vec<PostRecord>) -> Vec<PostRecord> {
        let keys: Vec<String> = posts.iter().map(|p| p.key.clone()).collect();
        let tags_by_key: HashMap<String, Vec<String>> =
            stream::iter(keys)
                .map(|key| {
                    let http = self.http.clone();
                    async move {
                        let url = format!("{LIST_URL}/{key}");
                        match http.get_json::<Detail>(&url).await {
                            Ok(detail) => (key, detail.tags),
                            Err(e) => {
                                warn!(source = "kakaobank", key = key.as_str(), error = %e,
                                    "Detail enrichment failed, keeping post untagged");
                                (key, Vec::new())
                            }
                        }
                    }
                })
                .buffer_unordered(ENRICH_CONCURRENCY)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect();

        posts
            .into_iter()
            .map(|mut post| {
                if let Some(tags) = tags_by_key.get(&post.key) {
                    post.tags = tags.clone();
                }
                post
            })
            .collect()
    }
}

fn convert(item: ListItem, page_url: &str) -> Result<PostRecord> {
    let slug = item
        .slug
        .filter(|s| !s.is_empty())
        .with_context(|| format!("kakaobank: post missing slug at {page_url}"))?;
    let title = item
        .title
        .filter(|t| !t.is_empty())
        .with_context(|| format!("kakaobank: post {slug} missing title at {page_url}"))?;
    let published = item
        .published_at
        .with_context(|| format!("kakaobank: post {slug} missing publishedAt at {page_url}"))?;
    let published_at = parse_kst_date(&published, "%Y-%m-%d")
        .with_context(|| format!("kakaobank: post {slug} at {page_url}"))?;

    Ok(PostRecord {
        source_url: format!("https://tech.kakaobank.com/posts/{slug}"),
        key: slug,
        title,
        description: item.summary,
        thumbnail_url: item.cover_image,
        published_at,
        tags: Vec::new(),
    })
}

#[async_trait]
impl SourceAdapter for KakaoBankAdapter {
    fn key(&self) -> &'static str {
        "kakaobank"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        let posts = fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{LIST_URL}?page={page}");
                let resp: ListResponse = http.get_json(&url).await?;
                if resp.items.is_empty() {
                    return Ok(PageFetch::Done);
                }
                let posts = resp
                    .items
                    .into_iter()
                    .map(|i| convert(i, &url))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PageFetch::Items(posts))
            }
        })
        .await?;

        Ok(self.enrich_tags(posts).await)
    }
}
