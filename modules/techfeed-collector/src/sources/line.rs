//! LINE Engineering — server-rendered listing pages. An empty listing page
//! marks the end of the archive.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_kst_date, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const BASE_URL: &str = "https://engineering.linecorp.com";
const LIST_URL: &str = "https://engineering.linecorp.com/ko/blog";
const FIRST_PAGE: u32 = 1;

pub struct LineAdapter {
    http: Http,
}

impl LineAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

pub(crate) fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse(".post-list .post-item").expect("valid selector");
    let link_sel = Selector::parse("a.post-title").expect("valid selector");
    let date_sel = Selector::parse("time.post-date").expect("valid selector");
    let desc_sel = Selector::parse(".post-description").expect("valid selector");
    let thumb_sel = Selector::parse("img.post-thumbnail").expect("valid selector");

    let base = Url::parse(BASE_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let link = item
            .select(&link_sel)
            .next()
            .with_context(|| format!("line: post without title link at {page_url}"))?;
        let href = link
            .value()
            .attr("href")
            .with_context(|| format!("line: title link without href at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("line: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("line: no key in {source_url} at {page_url}"))?;

        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            anyhow::bail!("line: post {key} missing title at {page_url}");
        }

        let datetime = item
            .select(&date_sel)
            .next()
            .and_then(|t| t.value().attr("datetime").map(str::to_string))
            .with_context(|| format!("line: post {key} missing datetime at {page_url}"))?;
        let published_at = parse_kst_date(&datetime, "%Y-%m-%d")
            .with_context(|| format!("line: post {key} at {page_url}"))?;

        let description = item
            .select(&desc_sel)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let thumbnail_url = item
            .select(&thumb_sel)
            .next()
            .and_then(|img| img.value().attr("src").map(str::to_string));

        posts.push(PostRecord {
            key,
            title,
            description,
            thumbnail_url,
            published_at,
            source_url,
            tags: Vec::new(),
        });
    }

    Ok(posts)
}

#[async_trait]
impl SourceAdapter for LineAdapter {
    fn key(&self) -> &'static str {
        "line"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = format!("{LIST_URL}?page={page}");
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

    const LISTING: &str = r#"
        <html><body><ul class="post-list">
          <li class="post-item">
            <a class="post-title" href="/ko/blog/armeria-timeouts">Tuning Armeria timeouts</a>
            <time class="post-date" datetime="2024-03-18">2024.03.18</time>
            <p class="post-description">Deadline propagation across services.</p>
            <img class="post-thumbnail" src="https://engineering.linecorp.com/img/armeria.png">
          </li>
          <li class="post-item">
            <a class="post-title" href="/ko/blog/abusing-kafka-headers">Kafka headers at LINE</a>
            <time class="post-date" datetime="2024-03-02">2024.03.02</time>
          </li>
        </ul></body></html>
    "#;

    #[test]
    fn parses_listing_page() {
        let posts = parse_listing(LISTING, "test").unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].key, "armeria-timeouts");
        assert_eq!(
            posts[0].source_url,
            "https://engineering.linecorp.com/ko/blog/armeria-timeouts"
        );
        assert_eq!(
            posts[0].thumbnail_url.as_deref(),
            Some("https://engineering.linecorp.com/img/armeria.png")
        );
        // Optional fields degrade to defaults.
        assert_eq!(posts[1].description, "");
        assert!(posts[1].thumbnail_url.is_none());
    }

    #[test]
    fn empty_listing_parses_to_no_posts() {
        let posts = parse_listing("<html><body></body></html>", "test").unwrap();
        assert!(posts.is_empty());
    }
}
