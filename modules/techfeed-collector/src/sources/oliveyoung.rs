//! Olive Young Tech.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_kst_date, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const BASE_URL: &str = "https://oliveyoung.tech";
const FIRST_PAGE: u32 = 1;

pub struct OliveYoungAdapter {
    http: Http,
}

impl OliveYoungAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("li.blog-item").expect("valid selector");
    let link_sel = Selector::parse("a.blog-item-link").expect("valid selector");
    let title_sel = Selector::parse(".blog-item-title").expect("valid selector");
    let date_sel = Selector::parse(".blog-item-date").expect("valid selector");
    let desc_sel = Selector::parse(".blog-item-desc").expect("valid selector");
    let thumb_sel = Selector::parse(".blog-item-thumb img").expect("valid selector");
    let tag_sel = Selector::parse(".blog-item-tags span").expect("valid selector");

    let base = Url::parse(BASE_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let href = item
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .with_context(|| format!("oliveyoung: item without link at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("oliveyoung: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("oliveyoung: no key in {source_url} at {page_url}"))?;

        let title = item
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .with_context(|| format!("oliveyoung: post {key} missing title at {page_url}"))?;

        let date_text = item
            .select(&date_sel)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .with_context(|| format!("oliveyoung: post {key} missing date at {page_url}"))?;
        let published_at = parse_kst_date(&date_text, "%Y.%m.%d")
            .with_context(|| format!("oliveyoung: post {key} at {page_url}"))?;

        posts.push(PostRecord {
            key,
            title,
            description: item
                .select(&desc_sel)
                .next()
                .map(|d| d.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
            thumbnail_url: item
                .select(&thumb_sel)
                .next()
                .and_then(|img| img.value().attr("src").map(str::to_string)),
            published_at,
            source_url,
            tags: item
                .select(&tag_sel)
                .map(|t| t.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        });
    }

    Ok(posts)
}

#[async_trait]
impl SourceAdapter for OliveYoungAdapter {
    fn key(&self) -> &'static str {
        "oliveyoung"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{BASE_URL}/blog/?page={page}");
                let html = http.get_text(&url).await?;
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
