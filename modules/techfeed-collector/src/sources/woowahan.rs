//! Woowahan Tech — WordPress REST listing. Asking for a page past the end
//! answers HTTP 400 (`rest_post_invalid_page_number`); that status is this
//! source's "no more pages", not a failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use techfeed_common::PostRecord;

use super::{strip_html, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const LIST_URL: &str = "https://techblog.woowahan.com/wp-json/wp/v2/posts";
const PAGE_SIZE: u32 = 20;
const FIRST_PAGE: u32 = 1;

#[derive(Debug, Deserialize)]
struct WpPost {
    id: Option<i64>,
    link: Option<String>,
    #[serde(rename = "date_gmt")]
    date_gmt: Option<String>,
    title: Option<Rendered>,
    excerpt: Option<Rendered>,
    #[serde(rename = "jetpack_featured_media_url")]
    featured_media_url: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(rename = "wp:term", default)]
    terms: Vec<Vec<Term>>,
}

#[derive(Debug, Deserialize)]
struct Term {
    #[serde(default)]
    name: String,
}

pub struct WoowahanAdapter {
    http: Http,
}

impl WoowahanAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn convert(post: WpPost, page_url: &str) -> Result<PostRecord> {
    let id = post
        .id
        .with_context(|| format!("woowahan: post missing id at {page_url}"))?;
    let link = post
        .link
        .filter(|l| !l.is_empty())
        .with_context(|| format!("woowahan: post {id} missing link at {page_url}"))?;
    let title = post
        .title
        .map(|t| strip_html(&t.rendered))
        .filter(|t| !t.is_empty())
        .with_context(|| format!("woowahan: post {id} missing title at {page_url}"))?;
    let date_gmt = post
        .date_gmt
        .with_context(|| format!("woowahan: post {id} missing date_gmt at {page_url}"))?;
    // date_gmt is already UTC, without an offset suffix.
    let naive = NaiveDateTime::parse_from_str(&date_gmt, "%Y-%m-%dT%H:%M:%S")
        .with_context(|| format!("woowahan: post {id} bad date_gmt {date_gmt} at {page_url}"))?;
    let published_at = Utc.from_utc_datetime(&naive);

    let tags = post
        .embedded
        .map(|e| {
            e.terms
                .into_iter()
                .flatten()
                .map(|t| t.name)
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(PostRecord {
        key: id.to_string(),
        title,
        description: post.excerpt.map(|e| strip_html(&e.rendered)).unwrap_or_default(),
        thumbnail_url: post.featured_media_url.filter(|u| !u.is_empty()),
        published_at,
        source_url: link,
        tags,
    })
}

#[async_trait]
impl SourceAdapter for WoowahanAdapter {
    fn key(&self) -> &'static str {
        "woowahan"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{LIST_URL}?page={page}&per_page={PAGE_SIZE}&_embed=wp:term");
                let Some(posts) = http.get_json_opt::<Vec<WpPost>>(&url).await? else {
                    return Ok(PageFetch::Done);
                };
                let posts = posts
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
    fn converts_wp_post_with_embedded_terms() {
        let posts: Vec<WpPost> = serde_json::from_str(
            r#"[{
                "id": 11021,
                "link": "https://techblog.woowahan.com/11021/",
                "date_gmt": "2024-04-29T02:11:40",
                "title": {"rendered": "MSA &amp; the delivery platform"},
                "excerpt": {"rendered": "<p>Splitting the monolith.</p>"},
                "jetpack_featured_media_url": "https://techblog.woowahan.com/cover.png",
                "_embedded": {"wp:term": [[{"name": "배민기술"}, {"name": "MSA"}]]}
            }]"#,
        )
        .unwrap();
        let post = convert(posts.into_iter().next().unwrap(), "test").unwrap();
        assert_eq!(post.key, "11021");
        assert_eq!(post.title, "MSA & the delivery platform");
        assert_eq!(post.description, "Splitting the monolith.");
        assert_eq!(post.tags, vec!["배민기술", "MSA"]);
    }
}
