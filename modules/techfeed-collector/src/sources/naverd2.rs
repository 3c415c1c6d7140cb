//! NAVER D2 — paged contents API, 0-based, epoch-millis timestamps. Pages
//! are independent, so this one runs through the concurrent driver.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use techfeed_common::PostRecord;

use super::{millis_to_utc, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged_concurrent, PageFetch, DEFAULT_PAGE_CONCURRENCY};

const LIST_URL: &str = "https://d2.naver.com/api/v2/contents";
const PAGE_SIZE: u32 = 20;
const FIRST_PAGE: u32 = 0;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    url: Option<String>,
    title: Option<String>,
    #[serde(default)]
    summary: String,
    #[serde(rename = "postPublishedAt")]
    post_published_at: Option<i64>,
    image: Option<Image>,
    #[serde(default)]
    tags: Vec<TagRef>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagRef {
    name: String,
}

pub struct NaverD2Adapter {
    http: Http,
}

impl NaverD2Adapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn convert(content: Content, page_url: &str) -> Result<PostRecord> {
    let path = content
        .url
        .filter(|u| !u.is_empty())
        .with_context(|| format!("naverd2: content missing url at {page_url}"))?;
    let key = url_tail(&path)
        .with_context(|| format!("naverd2: no key in url {path} at {page_url}"))?;
    let title = content
        .title
        .filter(|t| !t.is_empty())
        .with_context(|| format!("naverd2: content {key} missing title at {page_url}"))?;
    let millis = content
        .post_published_at
        .with_context(|| format!("naverd2: content {key} missing postPublishedAt at {page_url}"))?;
    let published_at =
        millis_to_utc(millis).with_context(|| format!("naverd2: content {key} at {page_url}"))?;

    Ok(PostRecord {
        key,
        title,
        description: content.summary,
        thumbnail_url: content.image.and_then(|i| i.url),
        published_at,
        source_url: format!("https://d2.naver.com{path}"),
        tags: content.tags.into_iter().map(|t| t.name).collect(),
    })
}

#[async_trait]
impl SourceAdapter for NaverD2Adapter {
    fn key(&self) -> &'static str {
        "naverd2"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged_concurrent(FIRST_PAGE, limit, DEFAULT_PAGE_CONCURRENCY, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{LIST_URL}?page={page}&size={PAGE_SIZE}");
                let resp: ListResponse = http.get_json(&url).await?;
                if resp.content.is_empty() {
                    return Ok(PageFetch::Done);
                }
                let posts = resp
                    .content
                    .into_iter()
                    .map(|c| convert(c, &url))
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
    fn converts_content_with_millis_timestamp() {
        let content = Content {
            url: Some("/helloworld/1234".into()),
            title: Some("GraalVM native images in CI".into()),
            summary: "Build-time tradeoffs.".into(),
            post_published_at: Some(1_714_608_000_000),
            image: Some(Image {
                url: Some("https://d2.naver.com/content/images/1234.png".into()),
            }),
            tags: vec![TagRef { name: "JVM".into() }],
        };
        let post = convert(content, "test").unwrap();
        assert_eq!(post.key, "1234");
        assert_eq!(post.source_url, "https://d2.naver.com/helloworld/1234");
        assert_eq!(post.published_at.timestamp_millis(), 1_714_608_000_000);
    }
}
