//! Saramin Tech. Thumbnails live in inline `background-image` styles, not
//! `img` tags, hence the regex fallback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_kst_date, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const BASE_URL: &str = "https://saramin.github.io";
const FIRST_PAGE: u32 = 1;

pub struct SaraminAdapter {
    http: Http,
}

impl SaraminAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn background_image_url(style: &str) -> Option<String> {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r#"background-image\s*:\s*url\(['"]?([^'")]+)['"]?\)"#)
            .expect("valid style regex")
    });
    re.captures(style).map(|cap| cap[1].to_string())
}

fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("div.post-box").expect("valid selector");
    let link_sel = Selector::parse("a.post-box-link").expect("valid selector");
    let title_sel = Selector::parse(".post-box-title").expect("valid selector");
    let date_sel = Selector::parse(".post-box-date").expect("valid selector");
    let desc_sel = Selector::parse(".post-box-contents").expect("valid selector");
    let cover_sel = Selector::parse(".post-box-cover").expect("valid selector");

    let base = Url::parse(BASE_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let href = item
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .with_context(|| format!("saramin: box without link at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("saramin: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("saramin: no key in {source_url} at {page_url}"))?;

        let title = item
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .with_context(|| format!("saramin: post {key} missing title at {page_url}"))?;

        let date_text = item
            .select(&date_sel)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .with_context(|| format!("saramin: post {key} missing date at {page_url}"))?;
        let published_at = parse_kst_date(&date_text, "%Y-%m-%d")
            .with_context(|| format!("saramin: post {key} at {page_url}"))?;

        let thumbnail_url = item
            .select(&cover_sel)
            .next()
            .and_then(|c| c.value().attr("style"))
            .and_then(background_image_url);

        posts.push(PostRecord {
            key,
            title,
            description: item
                .select(&desc_sel)
                .next()
                .map(|d| d.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
            thumbnail_url,
            published_at,
            source_url,
            tags: Vec::new(),
        });
    }

    Ok(posts)
}

#[async_trait]
impl SourceAdapter for SaraminAdapter {
    fn key(&self) -> &'static str {
        "saramin"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_background_image_urls() {
        assert_eq!(
            background_image_url("background-image: url('/assets/covers/es-tuning.png');"),
            Some("/assets/covers/es-tuning.png".to_string())
        );
        assert_eq!(background_image_url("color: red"), None);
    }
}
