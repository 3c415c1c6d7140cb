//! SOCAR Tech. Out-of-range page numbers silently redirect back to page 1
//! here; the driver's page-signature guard is what breaks that loop, the
//! adapter itself only reports what it sees.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_kst_date, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const BASE_URL: &str = "https://tech.socarcorp.kr";
const FIRST_PAGE: u32 = 1;

pub struct SocarAdapter {
    http: Http,
}

impl SocarAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse(".post-list .post").expect("valid selector");
    let link_sel = Selector::parse("a.post-link").expect("valid selector");
    let date_sel = Selector::parse(".post-date").expect("valid selector");
    let desc_sel = Selector::parse(".post-summary").expect("valid selector");

    let base = Url::parse(BASE_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let link = item
            .select(&link_sel)
            .next()
            .with_context(|| format!("socar: post without link at {page_url}"))?;
        let href = link
            .value()
            .attr("href")
            .with_context(|| format!("socar: link without href at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("socar: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("socar: no key in {source_url} at {page_url}"))?;

        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            anyhow::bail!("socar: post {key} missing title at {page_url}");
        }

        let date_text = item
            .select(&date_sel)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .with_context(|| format!("socar: post {key} missing date at {page_url}"))?;
        let published_at = parse_kst_date(&date_text, "%Y-%m-%d")
            .with_context(|| format!("socar: post {key} at {page_url}"))?;

        posts.push(PostRecord {
            key,
            title,
            description: item
                .select(&desc_sel)
                .next()
                .map(|d| d.text().collect::<String>().trim().to_string())
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
impl SourceAdapter for SocarAdapter {
    fn key(&self) -> &'static str {
        "socar"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{BASE_URL}/?page={page}");
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
