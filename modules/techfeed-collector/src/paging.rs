// Pagination driver: turns a per-source "fetch one page" function into a
// capped, deduplicated post sequence with uniform termination handling.
//
// Termination is a control value (PageFetch::Done), never an exception.
// Anything a page function returns as Err aborts the whole source.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::debug;

use techfeed_common::PostRecord;

/// In-flight page requests for the concurrent driver variant.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 8;

/// Hard ceiling on pages fetched from one source in one run. Guards against
/// a page function that never signals termination.
const MAX_PAGES: u32 = 500;

/// What one page fetch produced: items, or the source's "no more pages"
/// signal (an empty page also terminates, see the driver loop).
#[derive(Debug)]
pub enum PageFetch {
    Items(Vec<PostRecord>),
    Done,
}

/// Sequential driver. Preserves page order; used for document-traversal
/// sources where page N links to page N+1 content.
///
/// Stops on: the termination signal, an empty page, a repeated page
/// signature (platforms that silently redirect out-of-range page numbers
/// back to page 1), or the cap — mid-page if necessary, with no further
/// page fetch issued once reached.
pub async fn fetch_paged<F, Fut>(
    start_page: u32,
    limit: Option<usize>,
    mut page_fn: F,
) -> Result<Vec<PostRecord>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PageFetch>>,
{
    let cap = limit.unwrap_or(usize::MAX);
    if cap == 0 {
        return Ok(Vec::new());
    }

    let mut out: Vec<PostRecord> = Vec::new();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut seen_signatures: HashSet<u64> = HashSet::new();

    let mut page = start_page;
    while page < start_page.saturating_add(MAX_PAGES) {
        let items = match page_fn(page).await? {
            PageFetch::Done => break,
            PageFetch::Items(items) if items.is_empty() => break,
            PageFetch::Items(items) => items,
        };

        if !seen_signatures.insert(page_signature(&items)) {
            debug!(page, "paging: repeated page signature, stopping");
            break;
        }

        for item in items {
            if seen_keys.insert(item.key.clone()) {
                out.push(item);
                if out.len() >= cap {
                    return Ok(out);
                }
            }
        }

        page += 1;
    }

    Ok(out)
}

/// Concurrent driver for paged APIs: up to `width` page requests in flight.
/// Early stop is cooperative — once a worker reports termination, an empty
/// page, or the cap is covered, no new page is issued and in-flight pages
/// drain rather than being cancelled. Exhaustive up to the cap; cross-page
/// ordering is not guaranteed.
pub async fn fetch_paged_concurrent<F, Fut>(
    start_page: u32,
    limit: Option<usize>,
    width: usize,
    page_fn: F,
) -> Result<Vec<PostRecord>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<PageFetch>>,
{
    let cap = limit.unwrap_or(usize::MAX);
    if cap == 0 {
        return Ok(Vec::new());
    }

    let stop = AtomicBool::new(false);
    let fetched = AtomicUsize::new(0);
    let page_fn = &page_fn;
    let stop = &stop;
    let fetched = &fetched;

    let pages: Vec<(u32, Result<PageFetch>)> =
        stream::iter(start_page..start_page.saturating_add(MAX_PAGES))
            .take_while(|_| futures::future::ready(!stop.load(Ordering::Relaxed)))
            .map(|page| async move {
                let result = page_fn(page).await;
                match &result {
                    Ok(PageFetch::Done) | Err(_) => stop.store(true, Ordering::Relaxed),
                    Ok(PageFetch::Items(items)) => {
                        let before = fetched.fetch_add(items.len(), Ordering::Relaxed);
                        if items.is_empty() || before + items.len() >= cap {
                            stop.store(true, Ordering::Relaxed);
                        }
                    }
                }
                (page, result)
            })
            .buffer_unordered(width.max(1))
            .collect()
            .await;

    // Page order only for deterministic dedup; the caller gets no ordering
    // guarantee.
    let mut pages = pages;
    pages.sort_by_key(|(page, _)| *page);

    let mut out: Vec<PostRecord> = Vec::new();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut seen_signatures: HashSet<u64> = HashSet::new();

    for (page, result) in pages {
        let items = match result? {
            PageFetch::Done => continue,
            PageFetch::Items(items) if items.is_empty() => continue,
            PageFetch::Items(items) => items,
        };
        if !seen_signatures.insert(page_signature(&items)) {
            debug!(page, "paging: repeated page signature, dropping page");
            continue;
        }
        for item in items {
            if seen_keys.insert(item.key.clone()) {
                out.push(item);
                if out.len() >= cap {
                    return Ok(out);
                }
            }
        }
    }

    Ok(out)
}

/// Signature of one page's contents, over the item keys. Two pages with the
/// same signature are the same page served twice.
fn page_signature(items: &[PostRecord]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for item in items {
        item.key.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::testing::record;

    /// Page function over a fixed script; counts how many fetches were issued.
    fn scripted(
        script: Vec<PageFetch>,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut(u32) -> std::future::Ready<Result<PageFetch>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut script: Vec<Option<PageFetch>> = script.into_iter().map(Some).collect();
        let page_fn = move |page: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            let fetch = script
                .get_mut(page as usize)
                .and_then(|slot| slot.take())
                .unwrap_or(PageFetch::Done);
            std::future::ready(Ok(fetch))
        };
        (calls, page_fn)
    }

    fn page(keys: &[&str]) -> PageFetch {
        PageFetch::Items(keys.iter().map(|k| record(k)).collect())
    }

    #[tokio::test]
    async fn yields_all_pages_in_order_until_done() {
        let (_, page_fn) = scripted(vec![
            page(&["a", "b", "c"]),
            page(&["d", "e", "f"]),
            PageFetch::Done,
        ]);
        let posts = fetch_paged(0, None, page_fn).await.unwrap();
        let keys: Vec<&str> = posts.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[tokio::test]
    async fn cap_respected_mid_page_without_further_fetches() {
        let (calls, page_fn) = scripted(vec![
            page(&["a", "b", "c"]),
            page(&["d", "e", "f"]),
            page(&["g", "h", "i"]),
        ]);
        let posts = fetch_paged(0, Some(4), page_fn).await.unwrap();
        assert_eq!(posts.len(), 4);
        assert_eq!(posts[3].key, "d");
        // Cap hit inside page 1; page 2 must never be requested.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_page_signature_terminates() {
        // Page 1 serves the same content as page 0 — the out-of-range
        // redirect hazard. Must stop instead of looping.
        let (calls, page_fn) = scripted(vec![
            page(&["a", "b"]),
            page(&["a", "b"]),
            page(&["c", "d"]),
        ]);
        let posts = fetch_paged(0, None, page_fn).await.unwrap();
        let keys: Vec<&str> = posts.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn duplicate_keys_across_pages_collapse() {
        let (_, page_fn) = scripted(vec![page(&["a", "b"]), page(&["b", "c"]), PageFetch::Done]);
        let posts = fetch_paged(0, None, page_fn).await.unwrap();
        let keys: Vec<&str> = posts.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_page_terminates() {
        // kakaobank shape: two items on page one, nothing on page two.
        // Slot 0 pads the script because this source is 1-based.
        let (_, page_fn) = scripted(vec![
            PageFetch::Done,
            page(&["a", "b"]),
            PageFetch::Items(vec![]),
        ]);
        let posts = fetch_paged(1, None, page_fn).await.unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn error_aborts_the_source() {
        let page_fn = |page_no: u32| {
            std::future::ready(if page_no == 0 {
                Ok(page(&["a"]))
            } else {
                Err(anyhow::anyhow!("boom"))
            })
        };
        let result = fetch_paged(0, None, page_fn).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn concurrent_is_exhaustive_up_to_cap() {
        let (_, page_fn) = scripted(vec![
            page(&["a", "b"]),
            page(&["c", "d"]),
            page(&["e", "f"]),
            PageFetch::Done,
        ]);
        // scripted() uses FnMut state; wrap for the Fn-taking concurrent driver.
        let page_fn = std::sync::Mutex::new(page_fn);
        let posts = fetch_paged_concurrent(0, Some(5), 4, |p| {
            let fut = {
                let mut guard = page_fn.lock().unwrap();
                (&mut *guard)(p)
            };
            async move { fut.await }
        })
        .await
        .unwrap();
        assert_eq!(posts.len(), 5);
        let keys: HashSet<String> = posts.into_iter().map(|p| p.key).collect();
        let universe: HashSet<String> = ["a", "b", "c", "d", "e", "f"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(keys.is_subset(&universe));
    }

    #[tokio::test]
    async fn concurrent_stops_issuing_after_done() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let posts = fetch_paged_concurrent(0, None, 2, move |page| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(if page == 0 {
                    PageFetch::Items(vec![record("a")])
                } else {
                    PageFetch::Done
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(posts.len(), 1);
        // Width 2: pages 0 and 1 start together, 1 reports Done; at most one
        // more page slips in while the flag propagates.
        assert!(calls.load(Ordering::SeqCst) <= 3);
    }
}
