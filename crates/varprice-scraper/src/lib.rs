//! Crawl-and-extract pipeline for script-rendered storefronts.
//!
//! [`Coordinator`] walks a paginated listing ([`pagination`]), enumerates
//! each product's variant space ([`variants`]), waits for the price display
//! to settle after every selection ([`stabilize`]), and writes normalized
//! quotes to a [`QuoteWriter`]. Every call that reaches the page goes through
//! a [`PageNavigator`]; wrap one in [`Throttled`] to space requests with a
//! [`RateLimiter`].

pub mod coordinator;
pub mod error;
pub mod navigator;
pub mod normalize;
pub mod pagination;
pub mod rate_limit;
pub mod sink;
pub mod stabilize;
pub mod urls;
pub mod variants;

pub use coordinator::{Coordinator, RunSettings};
pub use error::{NavigatorError, ScraperError};
pub use navigator::{
    ChromiumNavigator, ChromiumNavigatorFactory, ChromiumOptions, Element, HttpNavigator,
    HttpNavigatorFactory, NavigatorFactory, PageNavigator, Throttled, ThrottledFactory,
    WaitPolicy,
};
pub use normalize::normalize_price;
pub use pagination::{crawl_listing, ListingCrawl};
pub use rate_limit::RateLimiter;
pub use sink::{open_writer, CsvQuoteWriter, JsonQuoteWriter, OutputLayout, QuoteWriter};
pub use stabilize::{stabilize, PriceDisplay, Stabilization, StabilizePolicy};
pub use variants::{apply_combination, discover_dimensions, Combinations};
