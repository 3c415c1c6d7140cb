//! KakaoPay Tech — JSON listing that reports `totalPages` on every payload,
//! so any page can tell whether it is past the end without adapter state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use techfeed_common::PostRecord;

use super::{parse_kst_datetime, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged_concurrent, PageFetch, DEFAULT_PAGE_CONCURRENCY};

const LIST_URL: &str = "https://tech.kakaopay.com/api/posts";
const PAGE_SIZE: u32 = 16;
const FIRST_PAGE: u32 = 1;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(rename = "totalPages", default)]
    total_pages: u32,
    #[serde(default)]
    posts: Vec<ListPost>,
}

#[derive(Debug, Deserialize)]
struct ListPost {
    slug: Option<String>,
    title: Option<String>,
    #[serde(default)]
    preview: String,
    #[serde(rename = "thumbnailUrl")]
    thumbnail_url: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

pub struct KakaoPayAdapter {
    http: Http,
}

impl KakaoPayAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn convert(post: ListPost, page_url: &str) -> Result<PostRecord> {
    let slug = post
        .slug
        .filter(|s| !s.is_empty())
        .with_context(|| format!("kakaopay: post missing slug at {page_url}"))?;
    let title = post
        .title
        .filter(|t| !t.is_empty())
        .with_context(|| format!("kakaopay: post {slug} missing title at {page_url}"))?;
    let created_at = post
        .created_at
        .with_context(|| format!("kakaopay: post {slug} missing createdAt at {page_url}"))?;
    let published_at = parse_kst_datetime(&created_at, "%Y-%m-%dT%H:%M:%S")
        .with_context(|| format!("kakaopay: post {slug} at {page_url}"))?;

    Ok(PostRecord {
        source_url: format!("https://tech.kakaopay.com/post/{slug}"),
        key: slug,
        title,
        description: post.preview,
        thumbnail_url: post.thumbnail_url,
        published_at,
        tags: post.keywords,
    })
}

#[async_trait]
impl SourceAdapter for KakaoPayAdapter {
    fn key(&self) -> &'static str {
        "kakaopay"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged_concurrent(FIRST_PAGE, limit, DEFAULT_PAGE_CONCURRENCY, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{LIST_URL}?page={page}&size={PAGE_SIZE}");
                let resp: ListResponse = http.get_json(&url).await?;
                if resp.total_pages > 0 && page > resp.total_pages {
                    return Ok(PageFetch::Done);
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
