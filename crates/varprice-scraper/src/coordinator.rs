//! Run orchestration: listing → per product → per combination → done.
//!
//! Failures are absorbed at the narrowest scope. A combination that cannot be
//! selected or never settles is counted and skipped; a product that cannot be
//! loaded is counted and skipped; only a listing whose first page cannot be
//! loaded ends the run with an error.
//!
//! Products are processed through `buffered(workers)`, so with several
//! workers pages load concurrently but results still reach the sink in
//! discovery order, from this single flow.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use varprice_core::{
    AppConfig, PriceQuote, ProductReference, RunSummary, SiteProfile, VariantCombination,
    VariantDimension,
};

use crate::error::ScraperError;
use crate::navigator::{NavigatorFactory, PageNavigator, WaitPolicy};
use crate::normalize::normalize_price;
use crate::pagination::crawl_listing;
use crate::sink::QuoteWriter;
use crate::stabilize::{
    cta_disabled, read_visible_price, stabilize, PriceDisplay, Stabilization, StabilizePolicy,
};
use crate::variants::{apply_combination, discover_dimensions, Combinations};

/// Run-level knobs, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub target_url: String,
    pub pagination_timeout: Duration,
    /// Overrides the profile's page cap when set.
    pub max_pages: Option<usize>,
    pub stabilize: StabilizePolicy,
    pub workers: usize,
    /// Emit unavailable combinations with `available = false` instead of
    /// dropping them.
    pub record_unavailable: bool,
}

impl RunSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            target_url: config.target_url.clone(),
            pagination_timeout: config.pagination_timeout(),
            max_pages: config.max_pages,
            stabilize: StabilizePolicy {
                timeout: config.stabilization_timeout(),
                settle_delay: config.settle_delay(),
                poll_interval: config.poll_interval(),
            },
            workers: config.workers,
            record_unavailable: config.record_unavailable,
        }
    }
}

/// What one product contributed to the run.
#[derive(Debug, Default)]
struct ProductOutcome {
    quotes: Vec<PriceQuote>,
    summary: RunSummary,
}

impl ProductOutcome {
    fn failed() -> Self {
        let mut outcome = Self::default();
        outcome.summary.products_failed = 1;
        outcome
    }

    fn cancelled() -> Self {
        let mut outcome = Self::default();
        outcome.summary.cancelled = true;
        outcome
    }
}

/// Idle navigators. With `buffered(workers)` at most `workers` products are in
/// flight, so a pool seeded with that many never runs dry; `take` returning
/// `None` only happens when a navigator was lost to an earlier failure.
struct NavigatorPool<N> {
    idle: Mutex<Vec<N>>,
}

impl<N> NavigatorPool<N> {
    fn new(seed: Vec<N>) -> Self {
        Self {
            idle: Mutex::new(seed),
        }
    }

    fn take(&self) -> Option<N> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    fn put(&self, navigator: N) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(navigator);
    }
}

pub struct Coordinator<'a, F> {
    factory: &'a F,
    profile: &'a SiteProfile,
    settings: RunSettings,
    placeholder: Regex,
    cancel: CancellationToken,
}

impl<'a, F: NavigatorFactory> Coordinator<'a, F> {
    /// # Errors
    ///
    /// [`ScraperError::Config`] when the profile fails validation.
    pub fn new(
        factory: &'a F,
        profile: &'a SiteProfile,
        settings: RunSettings,
        cancel: CancellationToken,
    ) -> Result<Self, ScraperError> {
        profile.validate()?;
        let placeholder = profile.placeholder_regex()?;
        Ok(Self {
            factory,
            profile,
            settings,
            placeholder,
            cancel,
        })
    }

    /// Crawls the target and writes every recorded quote to `sink`.
    ///
    /// `sink.finish()` is called exactly once, whether the run completes,
    /// is cancelled, or aborts.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::TargetUnreachable`] when listing page 1 cannot load.
    /// - Navigator-factory or sink failures.
    pub async fn run(&self, sink: &mut dyn QuoteWriter) -> Result<RunSummary, ScraperError> {
        let outcome = self.execute(sink).await;
        let flushed = sink.finish();
        let summary = outcome?;
        flushed?;
        Ok(summary)
    }

    async fn execute(&self, sink: &mut dyn QuoteWriter) -> Result<RunSummary, ScraperError> {
        let mut summary = RunSummary::default();
        let mut lister = self.factory.create().await?;

        info!(target_url = %self.settings.target_url, "crawling listing");
        let listing = match crawl_listing(
            &mut lister,
            self.profile,
            &self.settings.target_url,
            self.settings.pagination_timeout,
            self.settings.max_pages,
            &self.cancel,
        )
        .await
        {
            Ok(listing) => listing,
            Err(err) => {
                error!(error = %err, "listing crawl failed");
                return Err(err);
            }
        };
        summary.pages_crawled = listing.pages_crawled;
        summary.products_discovered = listing.products.len();
        info!(
            pages = listing.pages_crawled,
            products = listing.products.len(),
            single_product = listing.single_product,
            "listing complete"
        );

        let workers = self.settings.workers.max(1);
        let mut seed = vec![lister];
        for _ in 1..workers.min(listing.products.len()) {
            match self.factory.create().await {
                Ok(navigator) => seed.push(navigator),
                Err(err) => {
                    warn!(error = %err, "could not open extra worker; continuing with fewer");
                    break;
                }
            }
        }
        let pool = NavigatorPool::new(seed);
        let total = listing.products.len();

        let mut outcomes = stream::iter(listing.products.into_iter().enumerate())
            .map(|(index, product)| {
                let pool = &pool;
                async move { self.process(pool, index + 1, total, product).await }
            })
            .buffered(workers);

        while let Some(outcome) = outcomes.next().await {
            for quote in &outcome.quotes {
                sink.write_quote(quote)?;
            }
            summary.absorb(&outcome.summary);
        }

        summary.cancelled |= self.cancel.is_cancelled();
        info!(%summary, "run finished");
        Ok(summary)
    }

    async fn process(
        &self,
        pool: &NavigatorPool<F::Navigator>,
        position: usize,
        total: usize,
        product: ProductReference,
    ) -> ProductOutcome {
        if self.cancel.is_cancelled() {
            return ProductOutcome::cancelled();
        }
        let mut navigator = match pool.take() {
            Some(navigator) => navigator,
            None => match self.factory.create().await {
                Ok(navigator) => navigator,
                Err(err) => {
                    warn!(product = %product, error = %err, "no navigator available; skipping product");
                    return ProductOutcome::failed();
                }
            },
        };
        info!(product = %product, position, total, "processing product");
        let outcome = self.scrape_product(&mut navigator, &product).await;
        pool.put(navigator);
        info!(
            product = %product,
            recorded = outcome.summary.combinations_recorded,
            skipped = outcome.summary.combinations_skipped,
            timed_out = outcome.summary.combinations_timed_out,
            unavailable = outcome.summary.combinations_unavailable,
            "product finished"
        );
        outcome
    }

    /// Visits one product page and records its quotes.
    async fn scrape_product<N>(&self, navigator: &mut N, product: &ProductReference) -> ProductOutcome
    where
        N: PageNavigator + ?Sized,
    {
        if let Err(err) = navigator.navigate(product.as_str(), WaitPolicy::Load).await {
            warn!(product = %product, error = %err, "product page failed to load; skipping");
            return ProductOutcome::failed();
        }

        let mut outcome = ProductOutcome::default();
        outcome.summary.products_visited = 1;

        let product_name = match navigator.read_text(&self.profile.title_selector).await {
            Ok(title) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => product.to_string(),
            Err(err) => {
                debug!(product = %product, error = %err, "title unreadable; using URL");
                product.to_string()
            }
        };

        let dimensions =
            match discover_dimensions(navigator, self.profile, &self.placeholder).await {
                Ok(dimensions) => dimensions,
                Err(err) => {
                    warn!(product = %product, error = %err, "variant discovery failed; skipping product");
                    outcome.summary.products_failed = 1;
                    return outcome;
                }
            };

        if dimensions.is_empty() {
            match self.default_quote(navigator, product, &product_name).await {
                Ok(quote) => {
                    debug!(product = %product, price = %quote.price, "recorded default quote");
                    outcome.summary.combinations_recorded = 1;
                    outcome.quotes.push(quote);
                }
                Err(err) => {
                    warn!(product = %product, error = %err, "default price unreadable; skipping product");
                    outcome.summary.products_failed = 1;
                }
            }
            return outcome;
        }

        debug!(
            product = %product,
            dimensions = dimensions.len(),
            combinations = Combinations::total(&dimensions),
            "enumerating variants"
        );
        for combination in Combinations::new(&dimensions) {
            if self.cancel.is_cancelled() {
                info!(product = %product, "cancelled between combinations");
                outcome.summary.cancelled = true;
                break;
            }
            outcome.summary.combinations_attempted += 1;
            self.record_combination(
                navigator,
                product,
                &product_name,
                &dimensions,
                combination,
                &mut outcome,
            )
            .await;
        }
        outcome
    }

    /// Select → stabilize → record for one combination. Never fails: every
    /// outcome is folded into `outcome`.
    async fn record_combination<N>(
        &self,
        navigator: &mut N,
        product: &ProductReference,
        product_name: &str,
        dimensions: &[VariantDimension],
        combination: VariantCombination,
        outcome: &mut ProductOutcome,
    ) where
        N: PageNavigator + ?Sized,
    {
        let label = combination.label();
        if let Err(err) = apply_combination(navigator, dimensions, &combination).await {
            warn!(product = %product, variant = %label, error = %err, "skipping combination");
            outcome.summary.combinations_skipped += 1;
            return;
        }

        let display = PriceDisplay {
            variation_price: &self.profile.variation_price_selector,
            product_price: &self.profile.price_selector,
            cta: &self.profile.cta_selector,
            currency_symbols: &self.profile.currency_symbols,
        };
        match stabilize(navigator, display, self.settings.stabilize).await {
            Ok(Stabilization::Ready(price)) => {
                debug!(product = %product, variant = %label, price = %price, "recorded combination");
                outcome.summary.combinations_recorded += 1;
                outcome.quotes.push(PriceQuote {
                    product_url: product.clone(),
                    product_name: product_name.to_string(),
                    combination: Some(combination),
                    price,
                    available: true,
                });
            }
            Ok(Stabilization::Unavailable) => {
                debug!(product = %product, variant = %label, "combination unavailable");
                outcome.summary.combinations_unavailable += 1;
                if self.settings.record_unavailable {
                    outcome.summary.combinations_recorded += 1;
                    outcome.quotes.push(PriceQuote {
                        product_url: product.clone(),
                        product_name: product_name.to_string(),
                        combination: Some(combination),
                        price: String::new(),
                        available: false,
                    });
                }
            }
            Ok(Stabilization::TimedOut) => {
                warn!(product = %product, variant = %label, "price never settled; skipping combination");
                outcome.summary.combinations_timed_out += 1;
            }
            Err(err) => {
                warn!(product = %product, variant = %label, error = %err, "display unreadable; skipping combination");
                outcome.summary.combinations_skipped += 1;
            }
        }
    }

    /// The single quote of a product without selectable dimensions. The price
    /// is read as displayed (empty when absent); availability comes from the
    /// call-to-action.
    async fn default_quote<N>(
        &self,
        navigator: &mut N,
        product: &ProductReference,
        product_name: &str,
    ) -> Result<PriceQuote, ScraperError>
    where
        N: PageNavigator + ?Sized,
    {
        let raw = read_visible_price(navigator, &self.profile.price_selector)
            .await?
            .unwrap_or_default();
        let available = !cta_disabled(navigator, &self.profile.cta_selector).await?;
        Ok(PriceQuote {
            product_url: product.clone(),
            product_name: product_name.to_string(),
            combination: None,
            price: normalize_price(&raw, &self.profile.currency_symbols),
            available,
        })
    }
}
