//! Kurly Tech — static single-page archive; everything is on one listing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_kst_date, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const LIST_URL: &str = "https://helloworld.kurly.com/";
const FIRST_PAGE: u32 = 1;

pub struct KurlyAdapter {
    http: Http,
}

impl KurlyAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("article.post-card").expect("valid selector");
    let link_sel = Selector::parse("h2 a").expect("valid selector");
    let date_sel = Selector::parse(".post-meta .date").expect("valid selector");
    let excerpt_sel = Selector::parse(".post-excerpt").expect("valid selector");
    let tag_sel = Selector::parse(".post-tags .tag").expect("valid selector");

    let base = Url::parse(LIST_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let link = item
            .select(&link_sel)
            .next()
            .with_context(|| format!("kurly: post card without link at {page_url}"))?;
        let href = link
            .value()
            .attr("href")
            .with_context(|| format!("kurly: link without href at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("kurly: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("kurly: no key in {source_url} at {page_url}"))?;

        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            anyhow::bail!("kurly: post {key} missing title at {page_url}");
        }

        let date_text = item
            .select(&date_sel)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .with_context(|| format!("kurly: post {key} missing date at {page_url}"))?;
        let published_at = parse_kst_date(&date_text, "%Y.%m.%d")
            .with_context(|| format!("kurly: post {key} at {page_url}"))?;

        let description = item
            .select(&excerpt_sel)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let tags = item
            .select(&tag_sel)
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        posts.push(PostRecord {
            key,
            title,
            description,
            thumbnail_url: None,
            published_at,
            source_url,
            tags,
        });
    }

    Ok(posts)
}

#[async_trait]
impl SourceAdapter for KurlyAdapter {
    fn key(&self) -> &'static str {
        "kurly"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                if page > FIRST_PAGE {
                    return Ok(PageFetch::Done);
                }
                let html = http.get_text(LIST_URL).await?;
                Ok(PageFetch::Items(parse_listing(&html, LIST_URL)?))
            }
        })
        .await
    }
}
