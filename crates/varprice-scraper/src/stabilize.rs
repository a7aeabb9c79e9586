//! Waiting for the price display to settle after a selection.
//!
//! Every wait resolves to one of three outcomes, never a bare boolean:
//! [`Stabilization::Ready`] with the normalized price,
//! [`Stabilization::Unavailable`] when the call-to-action reports a disabled
//! state, or [`Stabilization::TimedOut`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::NavigatorError;
use crate::navigator::{Element, PageNavigator};
use crate::normalize::{first_displayed_price, normalize_price};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stabilization {
    /// The price element is visible and its normalized price non-empty.
    Ready(String),
    /// The call-to-action is present and disabled for this combination.
    Unavailable,
    /// The price never became readable within the timeout.
    TimedOut,
}

/// Timing for [`stabilize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizePolicy {
    /// Upper bound on polling after the settle delay.
    pub timeout: Duration,
    /// Unconditional pause before the first poll, absorbing pages that
    /// update the display twice per selection.
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for StabilizePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5_000),
            settle_delay: Duration::from_millis(200),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// The parts of a product page the stabilizer watches.
#[derive(Debug, Clone, Copy)]
pub struct PriceDisplay<'a> {
    /// Price container updated for the selected combination.
    pub variation_price: &'a str,
    /// Product price container, read when no variation price is shown (all
    /// variations share one price).
    pub product_price: &'a str,
    pub cta: &'a str,
    pub currency_symbols: &'a [String],
}

/// Polls the display until it resolves to a [`Stabilization`] outcome.
///
/// The call-to-action is checked before the price on every poll, so a
/// disabled button wins over a stale price left from the previous selection.
///
/// # Errors
///
/// Propagates navigator failures while reading the page.
pub async fn stabilize<N>(
    navigator: &mut N,
    display: PriceDisplay<'_>,
    policy: StabilizePolicy,
) -> Result<Stabilization, NavigatorError>
where
    N: PageNavigator + ?Sized,
{
    if !policy.settle_delay.is_zero() {
        tokio::time::sleep(policy.settle_delay).await;
    }
    let deadline = Instant::now() + policy.timeout;
    let mut polls = 0_u32;

    loop {
        polls += 1;
        if cta_disabled(navigator, display.cta).await? {
            debug!(polls, "call-to-action disabled; combination unavailable");
            return Ok(Stabilization::Unavailable);
        }
        let raw = match read_visible_price(navigator, display.variation_price).await? {
            Some(raw) => Some(raw),
            None => read_visible_price(navigator, display.product_price).await?,
        };
        if let Some(raw) = raw {
            let price = normalize_price(&raw, display.currency_symbols);
            if !price.is_empty() {
                debug!(polls, raw_price = %raw, "price display settled");
                return Ok(Stabilization::Ready(price));
            }
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(
                polls,
                timeout_ms = u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
                "price display did not settle"
            );
            return Ok(Stabilization::TimedOut);
        }
        tokio::time::sleep(policy.poll_interval.min(deadline - now)).await;
    }
}

/// `true` when the first call-to-action element exists and is disabled.
/// A missing call-to-action does not make a combination unavailable.
///
/// # Errors
///
/// Propagates navigator failures.
pub async fn cta_disabled<N>(navigator: &mut N, cta_selector: &str) -> Result<bool, NavigatorError>
where
    N: PageNavigator + ?Sized,
{
    Ok(navigator
        .query_all(cta_selector)
        .await?
        .first()
        .is_some_and(Element::is_disabled))
}

/// Displayed price text of the first visible, non-empty match of
/// `price_selector`.
///
/// A sale shows the regular price struck through next to the current one
/// inside `<ins>`, so an `<ins>` within the container is read first.
///
/// # Errors
///
/// Propagates navigator failures.
pub async fn read_visible_price<N>(
    navigator: &mut N,
    price_selector: &str,
) -> Result<Option<String>, NavigatorError>
where
    N: PageNavigator + ?Sized,
{
    for selector in [format!("{price_selector} ins"), price_selector.to_string()] {
        let elements = navigator.query_all(&selector).await?;
        let text = first_displayed_price(
            elements
                .iter()
                .filter(|el| el.visible)
                .map(|el| el.text.as_str()),
        );
        if let Some(text) = text {
            return Ok(Some(text.to_string()));
        }
    }
    Ok(None)
}
