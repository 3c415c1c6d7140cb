//! Kakao Tech — JSON listing API. The payload carries a `hasNextPage` flag;
//! once a page reports false the adapter stops requesting without waiting
//! for an empty page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use techfeed_common::PostRecord;

use super::{parse_kst_datetime, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const LIST_URL: &str = "https://tech.kakao.com/api/v1/posts";
const PAGE_SIZE: u32 = 12;
const FIRST_PAGE: u32 = 1;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(rename = "hasNextPage", default)]
    has_next_page: bool,
    #[serde(default)]
    posts: Vec<ListPost>,
}

#[derive(Debug, Deserialize)]
struct ListPost {
    slug: Option<String>,
    title: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(rename = "thumbnailUrl")]
    thumbnail_url: Option<String>,
    #[serde(rename = "releasedAt")]
    released_at: Option<String>,
    #[serde(default)]
    tags: Vec<TagRef>,
}

#[derive(Debug, Deserialize)]
struct TagRef {
    name: String,
}

pub struct KakaoAdapter {
    http: Http,
}

impl KakaoAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn convert(post: ListPost, page_url: &str) -> Result<PostRecord> {
    let slug = post
        .slug
        .filter(|s| !s.is_empty())
        .with_context(|| format!("kakao: post missing slug at {page_url}"))?;
    let title = post
        .title
        .filter(|t| !t.is_empty())
        .with_context(|| format!("kakao: post {slug} missing title at {page_url}"))?;
    let released_at = post
        .released_at
        .with_context(|| format!("kakao: post {slug} missing releasedAt at {page_url}"))?;
    let published_at = parse_kst_datetime(&released_at, "%Y-%m-%dT%H:%M:%S")
        .with_context(|| format!("kakao: post {slug} at {page_url}"))?;

    Ok(PostRecord {
        source_url: format!("https://tech.kakao.com/posts/{slug}"),
        key: slug,
        title,
        description: post.summary,
        thumbnail_url: post.thumbnail_url,
        published_at,
        tags: post.tags.into_iter().map(|t| t.name).collect(),
    })
}

#[async_trait]
impl SourceAdapter for KakaoAdapter {
    fn key(&self) -> &'static str {
        "kakao"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        let exhausted = Arc::new(AtomicBool::new(false));
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            let exhausted = exhausted.clone();
            async move {
                if exhausted.load(Ordering::Relaxed) {
                    return Ok(PageFetch::Done);
                }
                let url = format!("{LIST_URL}?page={page}&perPage={PAGE_SIZE}");
                let resp: ListResponse = http.get_json(&url).await?;
                if !resp.has_next_page {
                    exhausted.store(true, Ordering::Relaxed);
                }
                if resp.posts.is_empty() {
                    return Ok(PageFetch::Done);
                }
                let posts = resp
                    .posts
                    .into_iter()
                    .map(|p| convert(p, &url))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PageFetch::Items(posts))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_listing_post() {
        let resp: ListResponse = serde_json::from_str(
            r#"{
                "hasNextPage": true,
                "posts": [{
                    "slug": "kafka-consumer-rebalancing",
                    "title": "Kafka consumer rebalancing in practice",
                    "summary": "What we learned running 400 consumers.",
                    "thumbnailUrl": "https://tech.kakao.com/storage/k1.png",
                    "releasedAt": "2024-05-02T09:00:00",
                    "tags": [{"name": "Kafka"}, {"name": "Infra"}]
                }]
            }"#,
        )
        .unwrap();
        let post = convert(resp.posts.into_iter().next().unwrap(), "test").unwrap();
        assert_eq!(post.key, "kafka-consumer-rebalancing");
        assert_eq!(post.tags, vec!["Kafka", "Infra"]);
        assert_eq!(post.source_url, "https://tech.kakao.com/posts/kafka-consumer-rebalancing");
    }

    #[test]
    fn missing_title_is_a_source_error() {
        let post = ListPost {
            slug: Some("s".into()),
            title: None,
            summary: String::new(),
            thumbnail_url: None,
            released_at: Some("2024-05-02T09:00:00".into()),
            tags: vec![],
        };
        let err = convert(post, "https://tech.kakao.com/api/v1/posts?page=1").unwrap_err();
        assert!(err.to_string().contains("kakao"));
        assert!(err.to_string().contains("missing title"));
    }
}
