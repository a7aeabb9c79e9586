//! Scripted in-memory storefront implementing `PageNavigator`.
//!
//! A `FakeSite` maps URLs to listing pages or product pages. Product pages
//! model WooCommerce behaviour closely enough for the pipeline: option lists
//! that shrink depending on earlier selections, an add-to-cart button that is
//! disabled for some combinations, and a price that only appears a number of
//! polls after the last selection.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use varprice_core::{DimensionSelector, SiteProfile};
use varprice_scraper::{Element, NavigatorError, NavigatorFactory, PageNavigator, WaitPolicy};

pub const LISTING_SELECTOR: &str = "a[href*='/product/']";
pub const FORM_SELECT: &str = "form.variations_form select";
pub const TITLE_SELECTOR: &str = "h1.product_title";
pub const PRICE_SELECTOR: &str = ".summary .price";
pub const VARIATION_PRICE_SELECTOR: &str = ".woocommerce-variation-price .price";
pub const CTA_SELECTOR: &str = "button.single_add_to_cart_button";

pub fn control_selector(name: &str) -> String {
    format!("select[name=\"attribute_pa_{name}\"]")
}

/// Default profile with `location` and `width` declared as dimensions.
pub fn profile_with_dimensions(keys: &[&str]) -> SiteProfile {
    SiteProfile {
        dimension_selectors: keys
            .iter()
            .map(|key| DimensionSelector {
                key: (*key).to_string(),
                selector: control_selector(key),
            })
            .collect(),
        ..SiteProfile::default()
    }
}

#[derive(Debug, Clone)]
pub struct FakeDimension {
    pub name: String,
    /// `(value, text)`; include a placeholder to exercise filtering.
    pub options: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeProduct {
    pub title: String,
    pub dimensions: Vec<FakeDimension>,
    /// Raw price text per full combination of values.
    pub prices: HashMap<Vec<String>, String>,
    /// Product price container text. Variable products show it only when no
    /// variation price is rendered. `None` renders no price.
    pub flat_price: Option<String>,
    /// Combinations whose add-to-cart button is disabled.
    pub disabled: HashSet<Vec<String>>,
    /// `(dimension, value, (other dimension, other value))`: the option is
    /// removed from `dimension` while `other dimension` holds `other value`.
    pub unselectable: Vec<(String, String, (String, String))>,
    /// Price queries after a selection that still return nothing.
    pub price_delay_polls: usize,
    /// Combinations whose price never appears.
    pub never_priced: HashSet<Vec<String>>,
    /// When true the flat-price product's button is disabled.
    pub flat_disabled: bool,
}

impl FakeProduct {
    pub fn flat(title: &str, price: &str) -> Self {
        Self {
            title: title.to_string(),
            flat_price: Some(price.to_string()),
            ..Self::default()
        }
    }

    pub fn dimension(mut self, name: &str, values: &[&str]) -> Self {
        let mut options = vec![(String::new(), "Choose an option".to_string())];
        options.extend(
            values
                .iter()
                .map(|v| ((*v).to_string(), format!("{v} label"))),
        );
        self.dimensions.push(FakeDimension {
            name: name.to_string(),
            options,
        });
        self
    }

    pub fn price(mut self, values: &[&str], price: &str) -> Self {
        self.prices.insert(key(values), price.to_string());
        self
    }

    pub fn disable(mut self, values: &[&str]) -> Self {
        self.disabled.insert(key(values));
        self
    }
}

pub fn key(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

#[derive(Debug, Clone)]
pub enum FakePage {
    Listing(Vec<String>),
    Product(FakeProduct),
}

#[derive(Debug, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
    /// Every navigate / select call, in order: `"nav <url>"`, `"select <sel>=<value>"`.
    calls: Mutex<Vec<String>>,
    /// Wait policy of every navigation, in order.
    waits: Mutex<Vec<(String, WaitPolicy)>>,
    cancel_after_selections: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(mut self, url: &str, links: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            FakePage::Listing(links.iter().map(|l| (*l).to_string()).collect()),
        );
        self
    }

    pub fn product(mut self, url: &str, product: FakeProduct) -> Self {
        self.pages.insert(url.to_string(), FakePage::Product(product));
        self
    }

    /// Cancels `token` once `count` selections have been applied.
    pub fn cancel_after_selections(self, count: usize, token: CancellationToken) -> Self {
        *self.cancel_after_selections.lock().unwrap() = Some((count, token));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn waits(&self) -> Vec<(String, WaitPolicy)> {
        self.waits.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("nav ").map(str::to_string))
            .collect()
    }

    fn record(&self, call: String) {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        let selections = calls.iter().filter(|c| c.starts_with("select ")).count();
        if let Some((count, token)) = &*self.cancel_after_selections.lock().unwrap() {
            if selections >= *count {
                token.cancel();
            }
        }
    }
}

pub struct FakeNavigator {
    site: Arc<FakeSite>,
    current: Option<String>,
    /// dimension name → selected value
    selected: BTreeMap<String, String>,
    polls_since_selection: usize,
}

impl FakeNavigator {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self {
            site,
            current: None,
            selected: BTreeMap::new(),
            polls_since_selection: 0,
        }
    }

    fn page(&self) -> Option<&FakePage> {
        self.current.as_ref().and_then(|url| self.site.pages.get(url))
    }

    fn product(&self) -> Option<&FakeProduct> {
        match self.page() {
            Some(FakePage::Product(product)) => Some(product),
            _ => None,
        }
    }

    /// Index of the dimension a control selector addresses, by configured
    /// selector or by the generic fallback's `[name="…"]` form.
    fn dimension_index(product: &FakeProduct, selector: &str) -> Option<usize> {
        product.dimensions.iter().position(|d| {
            selector == control_selector(&d.name)
                || selector == format!("{FORM_SELECT}[name=\"attribute_pa_{}\"]", d.name)
        })
    }

    fn available_options<'p>(&self, product: &'p FakeProduct, index: usize) -> Vec<&'p (String, String)> {
        let dimension = &product.dimensions[index];
        dimension
            .options
            .iter()
            .filter(|(value, _)| {
                !product.unselectable.iter().any(|(dim, v, (other, other_value))| {
                    dim == &dimension.name
                        && v == value
                        && self.selected.get(other) == Some(other_value)
                })
            })
            .collect()
    }

    fn current_combination(&self, product: &FakeProduct) -> Option<Vec<String>> {
        product
            .dimensions
            .iter()
            .map(|d| self.selected.get(&d.name).cloned())
            .collect()
    }

    fn product_query(&mut self, selector: &str) -> Vec<Element> {
        let Some(product) = self.product().cloned() else {
            return Vec::new();
        };

        if selector == TITLE_SELECTOR {
            return vec![element("h1", &product.title, &[])];
        }
        if selector == FORM_SELECT {
            return product
                .dimensions
                .iter()
                .map(|d| element("select", "", &[("name", &format!("attribute_pa_{}", d.name))]))
                .collect();
        }
        if let Some(index) = Self::dimension_index(&product, selector) {
            let name = format!("attribute_pa_{}", product.dimensions[index].name);
            return vec![element("select", "", &[("name", &name)])];
        }
        if let Some(control) = selector.strip_suffix(" option") {
            let Some(index) = Self::dimension_index(&product, control) else {
                return Vec::new();
            };
            return self
                .available_options(&product, index)
                .into_iter()
                .map(|(value, text)| element("option", text, &[("value", value)]))
                .collect();
        }
        if selector == CTA_SELECTOR {
            let disabled = if product.dimensions.is_empty() {
                product.flat_disabled
            } else {
                self.current_combination(&product)
                    .map_or(true, |combo| product.disabled.contains(&combo))
            };
            let class = if disabled {
                "single_add_to_cart_button button disabled"
            } else {
                "single_add_to_cart_button button"
            };
            return vec![element("button", "Add to cart", &[("class", class)])];
        }
        if selector == PRICE_SELECTOR {
            return product
                .flat_price
                .iter()
                .map(|p| element("p", p, &[("class", "price")]))
                .collect();
        }
        if selector == VARIATION_PRICE_SELECTOR && !product.dimensions.is_empty() {
            self.polls_since_selection += 1;
            if self.polls_since_selection <= product.price_delay_polls {
                return Vec::new();
            }
            let Some(combo) = self.current_combination(&product) else {
                return Vec::new();
            };
            if product.never_priced.contains(&combo) {
                return Vec::new();
            }
            return product
                .prices
                .get(&combo)
                .map(|p| vec![element("span", p, &[])])
                .unwrap_or_default();
        }
        Vec::new()
    }
}

pub fn element(tag: &str, text: &str, attrs: &[(&str, &str)]) -> Element {
    Element {
        tag: tag.to_string(),
        text: text.to_string(),
        attributes: attrs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        visible: true,
    }
}

#[async_trait]
impl PageNavigator for FakeNavigator {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), NavigatorError> {
        self.site.record(format!("nav {url}"));
        self.site.waits.lock().unwrap().push((url.to_string(), wait));
        if !self.site.pages.contains_key(url) {
            return Err(NavigatorError::Navigation {
                url: url.to_string(),
                reason: "HTTP status 404".to_string(),
            });
        }
        self.current = Some(url.to_string());
        self.selected.clear();
        self.polls_since_selection = 0;
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigatorError> {
        if self.query_all(selector).await?.is_empty() {
            return Err(NavigatorError::NotFound {
                selector: selector.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigatorError> {
        match self.page().cloned() {
            Some(FakePage::Listing(links)) if selector == LISTING_SELECTOR => Ok(links
                .iter()
                .map(|href| element("a", "", &[("href", href)]))
                .collect()),
            Some(FakePage::Listing(_)) | None => Ok(Vec::new()),
            Some(FakePage::Product(_)) => Ok(self.product_query(selector)),
        }
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), NavigatorError> {
        self.site.record(format!("select {selector}={value}"));
        let Some(product) = self.product().cloned() else {
            return Err(NavigatorError::NotFound {
                selector: selector.to_string(),
                timeout_ms: 0,
            });
        };
        let Some(index) = Self::dimension_index(&product, selector) else {
            return Err(NavigatorError::NotFound {
                selector: selector.to_string(),
                timeout_ms: 0,
            });
        };
        let valid = self
            .available_options(&product, index)
            .iter()
            .any(|(v, _)| v == value && !v.is_empty());
        if !valid {
            return Err(NavigatorError::InvalidOption {
                selector: selector.to_string(),
                value: value.to_string(),
            });
        }
        self.selected
            .insert(product.dimensions[index].name.clone(), value.to_string());
        self.polls_since_selection = 0;
        Ok(())
    }
}

pub struct FakeSiteFactory {
    pub site: Arc<FakeSite>,
}

impl FakeSiteFactory {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }
}

#[async_trait]
impl NavigatorFactory for FakeSiteFactory {
    type Navigator = FakeNavigator;

    async fn create(&self) -> Result<FakeNavigator, NavigatorError> {
        Ok(FakeNavigator::new(Arc::clone(&self.site)))
    }
}
