//! Site profile: every selector, pattern, and pagination detail that varies
//! from one storefront to the next.
//!
//! Profiles are YAML files so that a new site, or a theme change on an
//! existing one, is a configuration edit rather than a code change. Any field
//! left out of the file takes the WooCommerce-flavoured default.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// How listing page `n` (1-based) is addressed. Page 1 is always the plain
/// base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum PaginationStyle {
    /// Path segment appended to the base URL, e.g. `/page/{n}/`.
    Path { template: String },
    /// Query parameter, e.g. `?product-page=n`.
    Query { param: String },
}

impl Default for PaginationStyle {
    fn default() -> Self {
        PaginationStyle::Path {
            template: "/page/{n}/".to_string(),
        }
    }
}

/// One configured selection control. `key` names the output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSelector {
    pub key: String,
    /// Selector of the `<select>` control itself, e.g. `select[name="attribute_pa_width"]`.
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub listing_item_selector: String,
    /// Selector for the anchor inside each listing item. `None` means the
    /// listing item is itself the anchor.
    pub listing_link_selector: Option<String>,
    pub variation_form_selector: String,
    pub dimension_selectors: Vec<DimensionSelector>,
    /// Container of the product's own price. Scoped to the product summary so
    /// related-product and cart prices further down the page never match.
    pub price_selector: String,
    /// Container of the price shown for the selected combination.
    pub variation_price_selector: String,
    /// Call-to-action control whose disabled state marks a combination unavailable.
    pub cta_selector: String,
    pub title_selector: String,
    pub currency_symbols: Vec<String>,
    /// Case-insensitive pattern matching placeholder option texts ("Choose an option").
    pub placeholder_pattern: String,
    pub pagination: PaginationStyle,
    pub max_pages: usize,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            listing_item_selector: "a[href*='/product/']".to_string(),
            listing_link_selector: None,
            variation_form_selector: "form.variations_form".to_string(),
            dimension_selectors: Vec::new(),
            price_selector: ".summary .price".to_string(),
            variation_price_selector: ".woocommerce-variation-price .price".to_string(),
            cta_selector: "button.single_add_to_cart_button".to_string(),
            title_selector: "h1.product_title".to_string(),
            currency_symbols: vec!["$".to_string(), "€".to_string(), "£".to_string()],
            placeholder_pattern: "(?i)choose|select".to_string(),
            pagination: PaginationStyle::default(),
            max_pages: 500,
        }
    }
}

impl SiteProfile {
    /// Builds the URL for listing page `page` (1-based) from `base_url`.
    ///
    /// Page 1 (and 0, defensively) returns `base_url` untouched.
    #[must_use]
    pub fn page_url(&self, base_url: &str, page: usize) -> String {
        if page <= 1 {
            return base_url.to_string();
        }
        match &self.pagination {
            PaginationStyle::Path { template } => {
                let (path_part, query) = match base_url.split_once('?') {
                    Some((p, q)) => (p, Some(q)),
                    None => (base_url, None),
                };
                let segment = template.replace("{n}", &page.to_string());
                let mut url = format!(
                    "{}/{}",
                    path_part.trim_end_matches('/'),
                    segment.trim_start_matches('/')
                );
                if let Some(q) = query {
                    url.push('?');
                    url.push_str(q);
                }
                url
            }
            PaginationStyle::Query { param } => {
                let sep = if base_url.contains('?') { '&' } else { '?' };
                format!("{base_url}{sep}{param}={page}")
            }
        }
    }

    /// Compiles [`Self::placeholder_pattern`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the pattern is not a valid regex.
    pub fn placeholder_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.placeholder_pattern).map_err(|e| {
            ConfigError::Validation(format!(
                "placeholder_pattern '{}' is not a valid regex: {e}",
                self.placeholder_pattern
            ))
        })
    }

    /// Output column keys, fixed for the whole run.
    #[must_use]
    pub fn dimension_keys(&self) -> Vec<String> {
        self.dimension_selectors
            .iter()
            .map(|d| d.key.clone())
            .collect()
    }

    /// Checks the profile for values that would make every page fail.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("listing_item_selector", &self.listing_item_selector),
            ("variation_form_selector", &self.variation_form_selector),
            ("price_selector", &self.price_selector),
            ("variation_price_selector", &self.variation_price_selector),
            ("cta_selector", &self.cta_selector),
            ("title_selector", &self.title_selector),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} must be non-empty")));
            }
        }

        if let Some(link) = &self.listing_link_selector {
            if link.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "listing_link_selector must be non-empty when set".to_string(),
                ));
            }
        }

        let mut seen_keys = HashSet::new();
        for dim in &self.dimension_selectors {
            if dim.key.trim().is_empty() || dim.selector.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "dimension selectors need a non-empty key and selector".to_string(),
                ));
            }
            if !seen_keys.insert(dim.key.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate dimension key: '{}'",
                    dim.key
                )));
            }
            if RESERVED_COLUMNS.contains(&dim.key.to_lowercase().as_str()) {
                return Err(ConfigError::Validation(format!(
                    "dimension key '{}' collides with a fixed output column",
                    dim.key
                )));
            }
        }

        match &self.pagination {
            PaginationStyle::Path { template } if !template.contains("{n}") => {
                return Err(ConfigError::Validation(format!(
                    "pagination template '{template}' must contain {{n}}"
                )));
            }
            PaginationStyle::Query { param } if param.trim().is_empty() => {
                return Err(ConfigError::Validation(
                    "pagination query param must be non-empty".to_string(),
                ));
            }
            _ => {}
        }

        if self.max_pages == 0 {
            return Err(ConfigError::Validation(
                "max_pages must be at least 1".to_string(),
            ));
        }

        self.placeholder_regex()?;
        Ok(())
    }
}

const RESERVED_COLUMNS: [&str; 5] = ["product_url", "product_name", "variant", "price", "available"];

/// Load and validate a site profile from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_profile(path: &Path) -> Result<SiteProfile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfileFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_profile(&content)
}

/// Parse and validate a site profile from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text does not parse or fails validation.
pub fn parse_profile(content: &str) -> Result<SiteProfile, ConfigError> {
    let profile: SiteProfile = serde_yaml::from_str(content)?;
    profile.validate()?;
    Ok(profile)
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
