//! Inventory feed enumeration.
//!
//! The feed is an HTML fragment of inventory cards, paged by `limit`/`offset`.
//! It includes recently sold cars, so sold and pending cards are dropped here.

use html_scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::dealer::{DealerError, ListingSource};

/// Paging bounds for one enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateOptions {
    pub page_size: u32,
    pub max_pages: u32,
    /// Pause between consecutive feed pages.
    pub page_delay: Duration,
}

/// What one feed page contained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    /// Every card on the page, sold or not.
    pub cards: usize,
    /// Absolute detail URLs of the active cards, in page order.
    pub urls: Vec<String>,
}

/// Parse one feed fragment into its active listing URLs.
pub fn parse_feed_page(body: &str, base: &Url) -> FeedPage {
    let html = Html::parse_fragment(body);
    let card_sel = Selector::parse("div.car-col div.item").unwrap();

    let mut page = FeedPage::default();
    for card in html.select(&card_sel) {
        page.cards += 1;
        if is_sold_or_pending(card) {
            continue;
        }
        if let Some(url) = detail_link(card, base) {
            page.urls.push(url);
        }
    }
    page
}

fn mentions_sold_or_pending(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("sold") || text.contains("pending")
}

/// A card is inactive when its overlay badge or price slot says so.
fn is_sold_or_pending(card: ElementRef<'_>) -> bool {
    let overlay_sel = Selector::parse("img.overlay").unwrap();
    let price_sel = Selector::parse(".price").unwrap();

    let overlay = card
        .select(&overlay_sel)
        .filter_map(|img| img.attr("alt"))
        .any(mentions_sold_or_pending);

    overlay
        || card
            .select(&price_sel)
            .any(|p| mentions_sold_or_pending(&p.text().collect::<String>()))
}

fn detail_link(card: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = [".vehicle_secp a[href]", ".hideBox a[href]", "a[href]"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            card.select(&sel)
                .filter_map(|a| a.attr("href"))
                .map(str::trim)
                .find(|href| !href.is_empty())
        })?;

    base.join(href).ok().map(String::from)
}

/// Walk the feed and collect the distinct active listing URLs in first-seen order.
///
/// Stops at the page limit, on an empty page, or on a page that adds nothing new
/// (the feed repeats its last page past the end). A failed page request aborts
/// the whole enumeration.
pub async fn collect_active_urls<S>(
    source: &S,
    options: &EnumerateOptions,
) -> Result<Vec<String>, DealerError>
where
    S: ListingSource + ?Sized,
{
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for page_index in 0..options.max_pages {
        if page_index > 0 && !options.page_delay.is_zero() {
            tokio::time::sleep(options.page_delay).await;
        }

        let Some(offset) = page_index.checked_mul(options.page_size) else {
            debug!(page = page_index, "feed offset out of range, stopping");
            break;
        };
        let body = source.fetch_feed_page(options.page_size, offset).await?;
        if body.trim().is_empty() {
            debug!(page = page_index, "empty feed page, stopping");
            break;
        }

        let page = parse_feed_page(&body, source.base_url());
        if page.cards == 0 {
            debug!(page = page_index, "feed page has no cards, stopping");
            break;
        }

        let before = urls.len();
        for url in page.urls {
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }

        let added = urls.len() - before;
        debug!(page = page_index, cards = page.cards, added, "parsed feed page");
        if added == 0 {
            break;
        }
    }

    info!(count = urls.len(), "enumerated active listings");
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn base() -> Url {
        Url::parse("https://www.dealer.example").unwrap()
    }

    fn card(inner: &str) -> String {
        format!(r#"<div class="item">{inner}</div>"#)
    }

    fn feed(cards: &[String]) -> String {
        format!(r#"<div class="car-col">{}</div>"#, cards.concat())
    }

    #[test]
    fn test_sold_and_pending_cards_excluded() {
        let body = feed(&[
            card(r#"<div class="vehicle_secp"><a href="/car/1">A</a></div><span class="price">$10,000</span>"#),
            card(r#"<img class="overlay" alt="SOLD"><a href="/car/2">B</a>"#),
            card(r#"<span class="price">Sale Pending</span><a href="/car/3">C</a>"#),
            card(r#"<img class="overlay" alt="Just arrived"><div class="hideBox"><a href="/car/4">D</a></div>"#),
        ]);
        let page = parse_feed_page(&body, &base());
        assert_eq!(page.cards, 4);
        assert_eq!(
            page.urls,
            vec![
                "https://www.dealer.example/car/1".to_string(),
                "https://www.dealer.example/car/4".to_string(),
            ]
        );
    }

    #[test]
    fn test_card_without_link_is_counted_but_skipped() {
        let body = feed(&[card("<span>no link</span>")]);
        let page = parse_feed_page(&body, &base());
        assert_eq!(page.cards, 1);
        assert!(page.urls.is_empty());
    }

    #[test]
    fn test_preferred_link_wins() {
        let body = feed(&[card(
            r#"<a href="/photo/9">img</a><div class="vehicle_secp"><a href="/car/9">Title</a></div>"#,
        )]);
        let page = parse_feed_page(&body, &base());
        assert_eq!(page.urls, vec!["https://www.dealer.example/car/9".to_string()]);
    }

    /// Serves canned feed pages keyed by offset and records requested offsets.
    struct FakeFeed {
        base: Url,
        pages: Vec<String>,
        page_size: u32,
        requested: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl ListingSource for FakeFeed {
        fn base_url(&self) -> &Url {
            &self.base
        }

        async fn fetch_feed_page(&self, _limit: u32, offset: u32) -> Result<String, DealerError> {
            self.requested.lock().unwrap().push(offset);
            let idx = (offset / self.page_size) as usize;
            Ok(self.pages.get(idx).cloned().unwrap_or_default())
        }

        async fn fetch_page(&self, url: &str) -> Result<String, DealerError> {
            Err(DealerError::InvalidUrl(url.to_string()))
        }
    }

    fn link_card(n: u32) -> String {
        card(&format!(r#"<a href="/car/{n}">car</a>"#))
    }

    fn options(max_pages: u32) -> EnumerateOptions {
        EnumerateOptions {
            page_size: 2,
            max_pages,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_collect_dedupes_and_stops_on_empty() {
        let source = FakeFeed {
            base: base(),
            pages: vec![
                feed(&[link_card(1), link_card(2)]),
                feed(&[link_card(2), link_card(3)]),
            ],
            page_size: 2,
            requested: Mutex::new(Vec::new()),
        };

        let urls = collect_active_urls(&source, &options(10)).await.unwrap();
        assert_eq!(
            urls,
            vec![
                "https://www.dealer.example/car/1",
                "https://www.dealer.example/car/2",
                "https://www.dealer.example/car/3",
            ]
        );
        assert_eq!(*source.requested.lock().unwrap(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_collect_stops_when_page_adds_nothing() {
        let repeated = feed(&[link_card(1), link_card(2)]);
        let source = FakeFeed {
            base: base(),
            pages: vec![repeated.clone(), repeated.clone(), repeated],
            page_size: 2,
            requested: Mutex::new(Vec::new()),
        };

        let urls = collect_active_urls(&source, &options(10)).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(source.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_respects_max_pages() {
        let source = FakeFeed {
            base: base(),
            pages: (0..5)
                .map(|p| feed(&[link_card(p * 2), link_card(p * 2 + 1)]))
                .collect(),
            page_size: 2,
            requested: Mutex::new(Vec::new()),
        };

        let urls = collect_active_urls(&source, &options(2)).await.unwrap();
        assert_eq!(urls.len(), 4);
        assert_eq!(*source.requested.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_all_sold_page_stops_enumeration() {
        let source = FakeFeed {
            base: base(),
            pages: vec![
                feed(&[card(r#"<img class="overlay" alt="Sold"><a href="/car/1">x</a>"#)]),
                feed(&[link_card(2)]),
            ],
            page_size: 2,
            requested: Mutex::new(Vec::new()),
        };

        let urls = collect_active_urls(&source, &options(10)).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_offset_overflow_stops_enumeration() {
        let page_size = u32::MAX / 2 + 1;
        let source = FakeFeed {
            base: base(),
            pages: (0..3).map(|p| feed(&[link_card(p)])).collect(),
            page_size,
            requested: Mutex::new(Vec::new()),
        };
        let options = EnumerateOptions {
            page_size,
            max_pages: 5,
            page_delay: Duration::ZERO,
        };

        let urls = collect_active_urls(&source, &options).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(*source.requested.lock().unwrap(), vec![0, page_size]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_delay_spaces_feed_requests() {
        let source = FakeFeed {
            base: base(),
            pages: (0..3)
                .map(|p| feed(&[link_card(p * 2), link_card(p * 2 + 1)]))
                .collect(),
            page_size: 2,
            requested: Mutex::new(Vec::new()),
        };
        let options = EnumerateOptions {
            page_size: 2,
            max_pages: 3,
            page_delay: Duration::from_millis(250),
        };

        let start = tokio::time::Instant::now();
        let urls = collect_active_urls(&source, &options).await.unwrap();
        assert_eq!(urls.len(), 6);
        // Two pauses between three pages, none before the first.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(750));
    }
}
