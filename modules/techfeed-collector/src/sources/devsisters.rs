//! Devsisters Tech — Gatsby archive, path-paged, 404 past the last page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use techfeed_common::PostRecord;

use super::{parse_kst_date, url_tail, SourceAdapter};
use crate::http::Http;
use crate::paging::{fetch_paged, PageFetch};

const BASE_URL: &str = "https://tech.devsisters.com";
const FIRST_PAGE: u32 = 1;

pub struct DevsistersAdapter {
    http: Http,
}

impl DevsistersAdapter {
    pub fn new(http: Http) -> Self {
        Self { http }
    }
}

fn parse_listing(html: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("article.blog-post-preview").expect("valid selector");
    let link_sel = Selector::parse("h3.title a").expect("valid selector");
    let date_sel = Selector::parse("span.date").expect("valid selector");
    let desc_sel = Selector::parse("p.spoiler").expect("valid selector");
    let thumb_sel = Selector::parse(".preview-image img").expect("valid selector");

    let base = Url::parse(BASE_URL).expect("valid base url");
    let mut posts = Vec::new();

    for item in document.select(&item_sel) {
        let link = item
            .select(&link_sel)
            .next()
            .with_context(|| format!("devsisters: preview without link at {page_url}"))?;
        let href = link
            .value()
            .attr("href")
            .with_context(|| format!("devsisters: link without href at {page_url}"))?;
        let source_url = base
            .join(href)
            .with_context(|| format!("devsisters: unresolvable href {href} at {page_url}"))?
            .to_string();
        let key = url_tail(&source_url)
            .with_context(|| format!("devsisters: no key in {source_url} at {page_url}"))?;

        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            anyhow::bail!("devsisters: post {key} missing title at {page_url}");
        }

        let date_text = item
            .select(&date_sel)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .with_context(|| format!("devsisters: post {key} missing date at {page_url}"))?;
        let published_at = parse_kst_date(&date_text, "%Y년 %m월 %d일")
            .with_context(|| format!("devsisters: post {key} at {page_url}"))?;

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
                .and_then(|img| img.value().attr("src"))
                .map(|src| {
                    base.join(src)
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| src.to_string())
                }),
            published_at,
            source_url,
            tags: Vec::new(),
        });
    }

    Ok(posts)
}

#[async_trait]
impl SourceAdapter for DevsistersAdapter {
    fn key(&self) -> &'static str {
        "devsisters"
    }

    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>> {
        fetch_paged(FIRST_PAGE, limit, |page| {
            let http = self.http.clone();
            async move {
                let url = if page == FIRST_PAGE {
                    format!("{BASE_URL}/blog/")
                } else {
                    format!("{BASE_URL}/blog/page/{page}/")
                };
                let Some(html) = http.get_text_opt(&url).await? else {
                    return Ok(PageFetch::Done);
                };
                Ok(PageFetch::Items(parse_listing(&html, &url)?))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_korean_dates() {
        let html = r#"
            <article class="blog-post-preview">
              <h3 class="title"><a href="/blog/post/cookierun-kingdom-db/">쿠키런 킹덤 DB 이야기</a></h3>
              <span class="date">2023년 11월 7일</span>
              <p class="spoiler">수백만 동접을 버티는 저장소.</p>
            </article>
        "#;
        let posts = parse_listing(html, "test").unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].key, "cookierun-kingdom-db");
        assert_eq!(posts[0].published_at.to_rfc3339(), "2023-11-06T15:00:00+00:00");
    }
}
