//! Contract over the external render capability.
//!
//! The pipeline never talks to a browser directly. It goes through
//! [`PageNavigator`], which exposes exactly the operations it consumes:
//! navigate, wait for a selector, list matching elements, read text, and
//! select an option. Elements come back as [`Element`] snapshots, so reading an
//! attribute is [`Element::attr`] rather than another round trip.
//!
//! Backends:
//! - [`ChromiumNavigator`]: headless Chromium via the DevTools protocol.
//! - [`HttpNavigator`]: plain HTTP + static HTML, for server-rendered listings.
//!
//! [`Throttled`] wraps any backend and gates navigations and selections
//! through a [`RateLimiter`].

mod chromium;
mod http;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::NavigatorError;
use crate::rate_limit::RateLimiter;

pub use chromium::{ChromiumNavigator, ChromiumNavigatorFactory, ChromiumOptions};
pub use http::{HttpNavigator, HttpNavigatorFactory};

/// When a navigation is considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Wait for the page's load event.
    #[default]
    Load,
    /// Return once the new document has been committed, before its load
    /// event. For callers that wait for a selector right after navigating.
    Commit,
}

/// Snapshot of a DOM element at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Element {
    /// Value of attribute `name`, or `None` when absent.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// `true` when the element reports a disabled state: the `disabled`
    /// attribute, `aria-disabled="true"`, or a `disabled` class (the way
    /// WooCommerce greys out its add-to-cart button).
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.attributes.contains_key("disabled")
            || self.attr("aria-disabled") == Some("true")
            || self.has_class("disabled")
    }

    /// Trimmed text content.
    #[must_use]
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// The operations the pipeline needs from a render capability.
///
/// Every call is a suspension point in a single logical control flow: callers
/// never overlap two operations on one navigator.
#[async_trait]
pub trait PageNavigator: Send {
    /// Loads `url`.
    ///
    /// # Errors
    ///
    /// [`NavigatorError::Navigation`] on timeout or network failure.
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), NavigatorError>;

    /// Waits until at least one element matches `selector`.
    ///
    /// # Errors
    ///
    /// [`NavigatorError::NotFound`] when `timeout` elapses first.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigatorError>;

    /// All elements matching `selector`, in document order. Possibly empty.
    ///
    /// # Errors
    ///
    /// Backend failures or an unparseable selector.
    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigatorError>;

    /// Text of the first element matching `selector`, `""` if none matches.
    ///
    /// # Errors
    ///
    /// Backend failures or an unparseable selector.
    async fn read_text(&mut self, selector: &str) -> Result<String, NavigatorError> {
        Ok(self
            .query_all(selector)
            .await?
            .into_iter()
            .next()
            .map(|el| el.text)
            .unwrap_or_default())
    }

    /// Chooses `value` in the `<select>` control matched by `selector`, as a
    /// user would.
    ///
    /// # Errors
    ///
    /// [`NavigatorError::InvalidOption`] when `value` is not an option of the
    /// control, [`NavigatorError::NotFound`] when the control is missing.
    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), NavigatorError>;
}

/// Creates independent navigators, one per concurrent worker.
#[async_trait]
pub trait NavigatorFactory: Send + Sync {
    type Navigator: PageNavigator;

    /// # Errors
    ///
    /// Backend failures while opening a new page or client.
    async fn create(&self) -> Result<Self::Navigator, NavigatorError>;
}

/// A navigator whose navigations and selections pass through a rate limiter.
///
/// Pure reads (`query_all`, `read_text`, `wait_for_selector`) operate on the
/// already-loaded page and are not throttled.
pub struct Throttled<N> {
    inner: N,
    limiter: RateLimiter,
}

impl<N: PageNavigator> Throttled<N> {
    pub fn new(inner: N, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<N: PageNavigator> PageNavigator for Throttled<N> {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), NavigatorError> {
        self.limiter.throttle().await;
        self.inner.navigate(url, wait).await
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigatorError> {
        self.inner.wait_for_selector(selector, timeout).await
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigatorError> {
        self.inner.query_all(selector).await
    }

    async fn read_text(&mut self, selector: &str) -> Result<String, NavigatorError> {
        self.inner.read_text(selector).await
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), NavigatorError> {
        self.limiter.throttle().await;
        self.inner.select_option(selector, value).await
    }
}

/// Wraps every navigator a factory creates in [`Throttled`].
///
/// With `shared == true` all navigators draw from one schedule (the rate
/// bounds aggregate traffic); otherwise each gets its own limiter.
pub struct ThrottledFactory<F> {
    inner: F,
    limiter: RateLimiter,
    shared: bool,
}

impl<F> ThrottledFactory<F> {
    pub fn new(inner: F, requests_per_second: f64, shared: bool) -> Self {
        Self {
            inner,
            limiter: RateLimiter::new(requests_per_second),
            shared,
        }
    }

    /// Returns the wrapped factory, e.g. to shut a browser down after a run.
    pub fn into_inner(self) -> F {
        self.inner
    }
}

#[async_trait]
impl<F: NavigatorFactory> NavigatorFactory for ThrottledFactory<F> {
    type Navigator = Throttled<F::Navigator>;

    async fn create(&self) -> Result<Self::Navigator, NavigatorError> {
        let limiter = if self.shared {
            self.limiter.clone()
        } else {
            RateLimiter::with_interval(self.limiter.min_interval())
        };
        Ok(Throttled::new(self.inner.create().await?, limiter))
    }
}

/// Polls `query_all(selector)` every `interval` until something matches or
/// `timeout` elapses. Shared by backends whose DOM can change between reads.
pub(crate) async fn poll_for_selector<N: PageNavigator + ?Sized>(
    navigator: &mut N,
    selector: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<(), NavigatorError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if !navigator.query_all(selector).await?.is_empty() {
            return Ok(());
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(NavigatorError::NotFound {
                selector: selector.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
