// Per-publisher fetch adapters. Every adapter satisfies the same contract:
// produce normalized PostRecords, finite, restartable per call, and decide
// its own termination (structured flag, past-the-end status code, empty
// page) through the pagination driver's PageFetch protocol.
//
// A missing required field is a source-tagged error that aborts only that
// source. Optional fields fall back to per-adapter defaults.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use techfeed_common::PostRecord;

use crate::http::Http;

mod banksalad;
mod devsisters;
mod hyperconnect;
mod kakao;
mod kakaobank;
mod kakaopay;
mod kurly;
mod line;
mod medium;
mod naverd2;
mod ncsoft;
mod oliveyoung;
mod saramin;
mod socar;
mod toss;
mod woowahan;

pub use medium::MediumAdapter;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Publisher key; matches the catalog's tech_blog.key, lowercase.
    fn key(&self) -> &'static str;

    /// Fetch up to `limit` distinct posts from this publisher. `None` lets
    /// the source's own content decide where to stop.
    async fn fetch_posts(&self, limit: Option<usize>) -> Result<Vec<PostRecord>>;
}

/// The full adapter set, built once at startup.
pub fn build_adapters(http: &Http) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(kakao::KakaoAdapter::new(http.clone())),
        Arc::new(kakaobank::KakaoBankAdapter::new(http.clone())),
        Arc::new(kakaopay::KakaoPayAdapter::new(http.clone())),
        Arc::new(toss::TossAdapter::new(http.clone())),
        Arc::new(naverd2::NaverD2Adapter::new(http.clone())),
        Arc::new(line::LineAdapter::new(http.clone())),
        Arc::new(woowahan::WoowahanAdapter::new(http.clone())),
        Arc::new(kurly::KurlyAdapter::new(http.clone())),
        Arc::new(banksalad::BanksaladAdapter::new(http.clone())),
        Arc::new(socar::SocarAdapter::new(http.clone())),
        Arc::new(devsisters::DevsistersAdapter::new(http.clone())),
        Arc::new(hyperconnect::HyperconnectAdapter::new(http.clone())),
        Arc::new(oliveyoung::OliveYoungAdapter::new(http.clone())),
        Arc::new(saramin::SaraminAdapter::new(http.clone())),
        Arc::new(ncsoft::NcsoftAdapter::new(http.clone())),
        Arc::new(medium::daangn(http.clone())),
        Arc::new(medium::coupang(http.clone())),
        Arc::new(medium::watcha(http.clone())),
        Arc::new(medium::yanolja(http.clone())),
        Arc::new(medium::gmarket(http.clone())),
    ]
}

// ---------------------------------------------------------------------------
// Shared extraction helpers
// ---------------------------------------------------------------------------

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Parse a timezone-less timestamp the way the publisher means it: KST.
pub(crate) fn parse_kst_datetime(value: &str, format: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, format)
        .with_context(|| format!("Unparseable timestamp: {value}"))?;
    Ok(kst().from_local_datetime(&naive).single().map_or_else(
        || Utc.from_utc_datetime(&naive),
        |dt| dt.with_timezone(&Utc),
    ))
}

/// Parse a date-only value (midnight KST).
pub(crate) fn parse_kst_date(value: &str, format: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, format)
        .with_context(|| format!("Unparseable date: {value}"))?;
    let naive = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
    Ok(kst()
        .from_local_datetime(&naive)
        .single()
        .map_or_else(|| Utc.from_utc_datetime(&naive), |dt| dt.with_timezone(&Utc)))
}

pub(crate) fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Unparseable RFC 3339 timestamp: {value}"))
}

pub(crate) fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {millis}"))
}

fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).expect("KST offset is valid")
}

/// Last non-empty path segment of a URL — the usual post key material.
pub(crate) fn url_tail(url: &str) -> Option<String> {
    url.split(['?', '#'])
        .next()
        .unwrap_or(url)
        .split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

/// Flatten markup out of excerpt/summary fields. Listing excerpts arrive as
/// HTML fragments from several publishers.
pub(crate) fn strip_html(fragment: &str) -> String {
    static TAG: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let tag = TAG.get_or_init(|| regex::Regex::new(r"<[^>]*>").expect("valid tag regex"));
    let text = tag.replace_all(fragment, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_tail_skips_query_and_trailing_slash() {
        assert_eq!(
            url_tail("https://toss.tech/article/engineering-note-12?ref=rss"),
            Some("engineering-note-12".to_string())
        );
        assert_eq!(
            url_tail("https://d2.naver.com/helloworld/1234/"),
            Some("1234".to_string())
        );
        assert_eq!(url_tail("https://example.com"), Some("example.com".to_string()));
    }

    #[test]
    fn strip_html_flattens_fragments() {
        assert_eq!(
            strip_html("<p>Kafka &amp; <b>Flink</b> in production</p>\n"),
            "Kafka & Flink in production"
        );
    }

    #[test]
    fn kst_datetime_converts_to_utc() {
        let dt = parse_kst_datetime("2024-05-02T09:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-02T00:00:00+00:00");
    }
}
