//! Toss Tech — workspace posts API behind a result envelope. A payload with
//! `resultType != SUCCESS` is a failed page, never a termination signal; the
//! `last` flag inside a successful payload is what ends the walk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use techfeed_common::PostRecord;

use super::{parse_rfc3339, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const LIST_URL: &str =
    "https://api-public.toss.im/api-public/v3/ipd-thor/api/v1/workspaces/15/posts";
const PAGE_SIZE: u32 = 20;
const FIRST_PAGE: u32 = 0;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "resultType", default)]
    result_type: String,
    success: Option<PageBody>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    last: bool,
    #[serde(default)]
    content: Vec<ApiPost>,
}

#[derive(Debug, Deserialize)]
struct ApiPost {
    id: Option<i64>,
    title: Option<String>,
    #[serde(default)]
    subtitle: String,
    #[serde(rename = "thumbnailImage")]
    thumbnail_image: Option<String>,
    #[serde(rename = "publishedTime")]
    published_time: Option<String>,
    #[serde(rename = "urlSlug")]
    url_slug: Option<String>,
}

pub struct TossAdapter {
    http: Http,
}

impl TossAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

/// Decode one page body. Returns the page's posts plus whether the payload
/// flagged itself as the last page.
fn parse_page(body: &str, page_url: &str) -> Result<(Vec<PostRecord>, bool)> {
    let envelope: Envelope =
        serde_json::from_str(body).with_context(|| format!("toss: bad payload at {page_url}"))?;

    if envelope.result_type != "SUCCESS" {
        let reported = if envelope.result_type.is_empty() {
            "<missing>"
        } else {
            envelope.result_type.as_str()
        };
        anyhow::bail!("toss: resultType {reported} at {page_url}");
    }
    let page = envelope
        .success
        .with_context(|| format!("toss: SUCCESS payload without body at {page_url}"))?;

    let last = page.last;
    let posts = page
        .content
        .into_iter()
        .map(|p| convert(p, page_url))
        .collect::<Result<Vec<_>>>()?;
    Ok((posts, last))
}

fn convert(post: ApiPost, page_url: &str) -> Result<PostRecord> {
    let id = post
        .id
        .with_context(|| format!("toss: post missing id at {page_url}"))?;
    let title = post
        .title
        .filter(|t| !t.is_empty())
        .with_context(|| format!("toss: post {id} missing title at {page_url}"))?;
    let published_time = post
        .published_time
        .with_context(|| format!("toss: post {id} missing publishedTime at {page_url}"))?;
    let published_at =
        parse_rfc3339(&published_time).with_context(|| format!("toss: post {id} at {page_url}"))?;

    let slug = post.url_slug.filter(|s| !s.is_empty());
    let source_url = match &slug {
        Some(slug) => format!("https://toss.tech/article/{slug}"),
        None => format!("https://toss.tech/article/{id}"),
    };

    Ok(PostRecord {
        key: slug.unwrap_or_else(|| id.to_string()),
        title,
        description: post.subtitle,
        thumbnail_url: post.thumbnail_image,
        published_at,
        source_url,
        tags: Vec::new(),
    })
}

#[async_trait]
impl SourceAdapter for TossAdapter {
    fn key(&self) -> &'static str {
        "toss"
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
                let url = format!("{LIST_URL}?page={page}&size={PAGE_SIZE}");
                let body = http.get_text(&url).await?;
                let (posts, last) = parse_page(&body, &url)?;
                if last {
                    exhausted.store(true, Ordering::Relaxed);
                }
                if posts.is_empty() {
                    return Ok(PageFetch::Done);
                }
                Ok(PageFetch::Items(posts))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "resultType": "SUCCESS",
        "success": {
            "last": false,
            "content": [{
                "id": 88,
                "title": "Slash 24: payments at scale",
                "subtitle": "Designing the ledger",
                "thumbnailImage": "https://static.toss.im/88.png",
                "publishedTime": "2024-06-11T10:30:00+09:00",
                "urlSlug": "payments-at-scale"
            }]
        }
    }"#;

    #[test]
    fn parses_successful_page() {
        let (posts, last) = parse_page(PAGE, "test").unwrap();
        assert!(!last);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].key, "payments-at-scale");
        assert_eq!(posts[0].source_url, "https://toss.tech/article/payments-at-scale");
    }

    #[test]
    fn non_success_result_type_is_a_failure_not_termination() {
        let body = r#"{"resultType": "FAIL", "error": {"reason": "upstream"}}"#;
        let err = parse_page(body, "https://api-public.toss.im/...?page=0").unwrap_err();
        assert!(err.to_string().contains("resultType FAIL"));
    }
}
