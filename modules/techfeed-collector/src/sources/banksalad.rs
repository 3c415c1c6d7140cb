//! Banksalad Tech — path-paged listing (`/blog/page/N`); the page after the
//! last one is a plain 404.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_kst_date, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const BASE_URL: &str = "https://blog.banksalad.com";
const FIRST_PAGE: u32 = 1;

pub struct BanksaladAdapter {
    http: Http,
}

impl BanksaladAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("li.article-card").expect("valid selector");
    let link_sel = Selector::parse("a.article-link").expect("valid selector");
    let title_sel = Selector::parse(".article-title").expect("valid selector");
    let date_sel = Selector::parse("time").expect("valid selector");
    let summary_sel = Selector::parse(".article-summary").expect("valid selector");
    let thumb_sel = Selector::parse(".article-cover img").expect("valid selector");

    let base = Url::parse(BASE_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let href = item
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .with_context(|| format!("banksalad: card without link at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("banksalad: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("banksalad: no key in {source_url} at {page_url}"))?;

        let title = item
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .with_context(|| format!("banksalad: post {key} missing title at {page_url}"))?;

        let datetime = item
            .select(&date_sel)
            .next()
            .and_then(|t| t.value().attr("datetime").map(str::to_string))
            .with_context(|| format!("banksalad: post {key} missing datetime at {page_url}"))?;
        let published_at = parse_kst_date(&datetime, "%Y-%m-%d")
            .with_context(|| format!("banksalad: post {key} at {page_url}"))?;

        posts.push(PostRecord {
            key,
            title,
            description: item
                .select(&summary_sel)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
            thumbnail_url: item
                .select(&thumb_sel)
                .next()
                .and_then(|img| img.value().attr("src").map(str::to_string)),
            published_at,
            source_url,
            tags: Vec::new(),
        });
    }

    Ok(posts)
}

#[async_trait]
impl SourceAdapter for BanksaladAdapter {
    fn key(&self) -> &'static str {
        "banksalad"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{BASE_URL}/blog/page/{page}");
                let Some(html) = http.get_text_opt(&url).await? else {
                    return Ok(PageFetch::Done);
                };
                Ok(PageFetch::Items(parse_listing(&html, &url)?))
            }
        })
        .await
    }
}
