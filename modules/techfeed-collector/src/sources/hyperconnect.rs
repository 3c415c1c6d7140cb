//! Hyperconnect Tech.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_rfc3339, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const BASE_URL: &str = "https://hyperconnect.github.io";
const FIRST_PAGE: u32 = 1;

pub struct HyperconnectAdapter {
    http: Http,
}

impl HyperconnectAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("div.post-entry").expect("valid selector");
    let link_sel = Selector::parse("a.entry-link").expect("valid selector");
    let title_sel = Selector::parse("h2.entry-title").expect("valid selector");
    let time_sel = Selector::parse("time[datetime]").expect("valid selector");
    let excerpt_sel = Selector::parse(".entry-excerpt").expect("valid selector");

    let base = Url::parse(BASE_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let href = item
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .with_context(|| format!("hyperconnect: entry without link at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("hyperconnect: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("hyperconnect: no key in {source_url} at {page_url}"))?;

        let title = item
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .with_context(|| format!("hyperconnect: post {key} missing title at {page_url}"))?;

        let datetime = item
            .select(&time_sel)
            .next()
            .and_then(|t| t.value().attr("datetime").map(str::to_string))
            .with_context(|| format!("hyperconnect: post {key} missing datetime at {page_url}"))?;
        let published_at = parse_rfc3339(&datetime)
            .with_context(|| format!("hyperconnect: post {key} at {page_url}"))?;

        posts.push(PostRecord {
            key,
            title,
            description: item
                .select(&excerpt_sel)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
            thumbnail_url: None,
            published_at,
            source_url,
            tags: Vec::new(),
        });
    }

    Ok(posts)
}

#[async_trait]
impl SourceAdapter for HyperconnectAdapter {
    fn key(&self) -> &'static str {
        "hyperconnect"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{BASE_URL}/blog/page{page}/");
                let Some(html) = http.get_text_opt(&url).await? else {
                    return Ok(PageFetch::Done);
                };
                let posts = parse_listing(&html, &url)?;
                if posts.is_empty() {
                    return Ok(PageFetch::Done);
                }
                Ok(PageFetch::Items(posts))
            }
        })
        .await
    }
}
