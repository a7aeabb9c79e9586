//! Listing-page crawl: page 1, 2, 3, … until a page adds nothing new.
//!
//! Page URLs come from [`SiteProfile::page_url`], so path-segment
//! (`/page/N/`) and query-parameter (`?product-page=N`) sites share one loop.
//! The crawl stops at the first page that
//! - fails to show a listing item within the pagination timeout,
//! - contributes zero *new* product links (a site that repeats its last page
//!   for out-of-range indices terminates here rather than looping), or
//! - reaches the profile's `max_pages` cap.
//!
//! When page 1 never shows a listing item, the target URL is taken to be a
//! product page itself (single-product mode).

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use varprice_core::{ProductReference, SiteProfile};

use crate::error::{NavigatorError, ScraperError};
use crate::navigator::{PageNavigator, WaitPolicy};
use crate::urls::resolve_link;

/// Result of crawling a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCrawl {
    /// Product references in first-seen order, without duplicates.
    pub products: Vec<ProductReference>,
    pub pages_crawled: usize,
    /// `true` when page 1 had no listing items and the target URL itself was
    /// returned as the only product.
    pub single_product: bool,
}

/// Ordered set of product URLs.
#[derive(Debug, Default)]
struct DiscoveredProducts {
    seen: HashSet<String>,
    ordered: Vec<ProductReference>,
}

impl DiscoveredProducts {
    /// Adds `url` if unseen; returns whether it was new.
    fn insert(&mut self, url: String) -> bool {
        if self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.ordered.push(ProductReference::new(url));
        true
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }
}

/// Crawls the listing rooted at `base_url`.
///
/// `max_pages` overrides the profile's cap when `Some`. Cancellation is
/// honoured between pages.
///
/// # Errors
///
/// - [`ScraperError::TargetUnreachable`] when page 1 cannot be navigated.
/// - [`ScraperError::Navigator`] when page 1 fails for a reason other than a
///   missing listing item (for example an unparseable selector).
///
/// Failures on later pages end the crawl with what was found so far.
pub async fn crawl_listing<N>(
    navigator: &mut N,
    profile: &SiteProfile,
    base_url: &str,
    pagination_timeout: Duration,
    max_pages: Option<usize>,
    cancel: &CancellationToken,
) -> Result<ListingCrawl, ScraperError>
where
    N: PageNavigator + ?Sized,
{
    let max_pages = max_pages.unwrap_or(profile.max_pages).max(1);
    let mut discovered = DiscoveredProducts::default();
    let mut pages_crawled = 0;

    for page in 1..=max_pages {
        if page > 1 && cancel.is_cancelled() {
            info!(page, "crawl cancelled before loading page");
            break;
        }

        let page_url = profile.page_url(base_url, page);
        info!(page, url = %page_url, "loading listing page");

        // The item wait below stands in for the load event.
        if let Err(err) = navigator.navigate(&page_url, WaitPolicy::Commit).await {
            if page == 1 {
                return Err(ScraperError::TargetUnreachable {
                    url: page_url,
                    source: err,
                });
            }
            warn!(page, url = %page_url, error = %err, "listing page failed to load; stopping");
            break;
        }
        pages_crawled += 1;

        match navigator
            .wait_for_selector(&profile.listing_item_selector, pagination_timeout)
            .await
        {
            Ok(()) => {}
            Err(NavigatorError::NotFound { .. }) if page == 1 => {
                info!(
                    url = base_url,
                    "no listing items on first page; treating target as a single product"
                );
                return Ok(ListingCrawl {
                    products: vec![ProductReference::new(base_url)],
                    pages_crawled,
                    single_product: true,
                });
            }
            Err(NavigatorError::NotFound { .. }) => {
                warn!(page, "no listing items appeared before timeout; stopping");
                break;
            }
            Err(err) if page == 1 => return Err(err.into()),
            Err(err) => {
                warn!(page, error = %err, "listing page could not be read; stopping");
                break;
            }
        }

        let hrefs = match collect_hrefs(navigator, profile).await {
            Ok(hrefs) => hrefs,
            Err(err) if page == 1 => return Err(err.into()),
            Err(err) => {
                warn!(page, error = %err, "listing links could not be read; stopping");
                break;
            }
        };

        let mut new_links = 0;
        for href in &hrefs {
            match resolve_link(&page_url, href) {
                Some(url) => {
                    if discovered.insert(url) {
                        new_links += 1;
                    }
                }
                None => debug!(page, href = %href, "ignoring unusable link"),
            }
        }

        info!(
            page,
            links = hrefs.len(),
            new_links,
            total = discovered.len(),
            "listing page processed"
        );
        if new_links == 0 {
            info!(page, "page added no new products; pagination complete");
            break;
        }
        if page == max_pages {
            warn!(max_pages, "page cap reached; stopping pagination");
        }
    }

    Ok(ListingCrawl {
        products: discovered.ordered,
        pages_crawled,
        single_product: false,
    })
}

/// Raw `href` values of every listing link on the current page.
///
/// With a `listing_link_selector`, links are looked up as descendants of the
/// listing items; otherwise the items are the links.
async fn collect_hrefs<N>(
    navigator: &mut N,
    profile: &SiteProfile,
) -> Result<Vec<String>, NavigatorError>
where
    N: PageNavigator + ?Sized,
{
    let selector = match &profile.listing_link_selector {
        Some(link) => format!("{} {}", profile.listing_item_selector, link),
        None => profile.listing_item_selector.clone(),
    };
    Ok(navigator
        .query_all(&selector)
        .await?
        .into_iter()
        .filter_map(|el| el.attr("href").map(str::to_string))
        .collect())
}
