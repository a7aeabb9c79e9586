//! Variant-space discovery, enumeration, and application.
//!
//! Discovery reads each selection control's `<option>` list once per product.
//! Enumeration is a lazy odometer over the discovered dimensions: the first
//! dimension is the outermost loop, so the order is deterministic for a given
//! set of dimensions. Application drives the page's controls for one
//! combination; any failure is reported as [`ScraperError::SelectionFailed`]
//! and the caller skips just that combination.

use regex::Regex;
use tracing::debug;
use varprice_core::{
    SelectedOption, SiteProfile, VariantCombination, VariantDimension, VariantOption,
};

use crate::error::{NavigatorError, ScraperError};
use crate::navigator::{Element, PageNavigator};

/// Column key used for the generic fallback control when it has no `name`.
pub const FALLBACK_DIMENSION_KEY: &str = "variant";

/// Discovers the selectable dimensions of the currently loaded product page.
///
/// Configured dimension selectors are tried in declaration order; those that
/// match no control are skipped. When none match (or none are configured) the
/// first `<select>` inside the variation form is used. Dimensions left with no
/// options after placeholder filtering are dropped. An empty result means a
/// flat-price product.
///
/// # Errors
///
/// Propagates navigator failures (backend errors, invalid selectors).
pub async fn discover_dimensions<N>(
    navigator: &mut N,
    profile: &SiteProfile,
    placeholder: &Regex,
) -> Result<Vec<VariantDimension>, NavigatorError>
where
    N: PageNavigator + ?Sized,
{
    let mut dimensions = Vec::new();
    for configured in &profile.dimension_selectors {
        if navigator.query_all(&configured.selector).await?.is_empty() {
            debug!(key = %configured.key, selector = %configured.selector, "dimension control not present");
            continue;
        }
        let options = read_options(navigator, &configured.selector, placeholder).await?;
        push_dimension(&mut dimensions, configured.key.clone(), configured.selector.clone(), options);
    }
    if !dimensions.is_empty() {
        return Ok(dimensions);
    }

    let generic = format!("{} select", profile.variation_form_selector);
    let Some(control) = navigator.query_all(&generic).await?.into_iter().next() else {
        return Ok(dimensions);
    };
    let (key, selector) = fallback_control(&generic, &control);
    let options = read_options(navigator, &selector, placeholder).await?;
    push_dimension(&mut dimensions, key, selector, options);
    Ok(dimensions)
}

/// Key and a selector that addresses exactly `control` among `generic` matches.
fn fallback_control(generic: &str, control: &Element) -> (String, String) {
    match control.attr("name").filter(|n| !n.is_empty()) {
        Some(name) => {
            let quoted = serde_json::to_string(name).unwrap_or_else(|_| format!("\"{name}\""));
            (name.to_string(), format!("{generic}[name={quoted}]"))
        }
        None => (FALLBACK_DIMENSION_KEY.to_string(), generic.to_string()),
    }
}

fn push_dimension(
    dimensions: &mut Vec<VariantDimension>,
    key: String,
    selector: String,
    options: Vec<VariantOption>,
) {
    if options.is_empty() {
        debug!(key = %key, "dimension has no selectable options; ignoring");
        return;
    }
    debug!(key = %key, options = options.len(), "discovered dimension");
    dimensions.push(VariantDimension {
        key,
        selector,
        options,
    });
}

async fn read_options<N>(
    navigator: &mut N,
    control_selector: &str,
    placeholder: &Regex,
) -> Result<Vec<VariantOption>, NavigatorError>
where
    N: PageNavigator + ?Sized,
{
    let elements = navigator
        .query_all(&format!("{control_selector} option"))
        .await?;
    Ok(filter_options(&elements, placeholder))
}

/// Drops placeholder entries: empty values and texts matching `placeholder`.
#[must_use]
pub fn filter_options(elements: &[Element], placeholder: &Regex) -> Vec<VariantOption> {
    elements
        .iter()
        .filter_map(|el| {
            let value = el.attr("value").map(str::trim).unwrap_or_default();
            let text = el.trimmed_text();
            if value.is_empty() || placeholder.is_match(text) {
                return None;
            }
            Some(VariantOption {
                value: value.to_string(),
                text: text.to_string(),
            })
        })
        .collect()
}

/// Lazy Cartesian product over a set of dimensions.
///
/// Yields `n1 × n2 × … × nk` combinations, the last dimension varying
/// fastest. Zero dimensions yield the single empty combination; any
/// dimension with no options yields nothing. A clone resumes from the same
/// position; [`Combinations::new`] restarts from the first combination.
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    dimensions: &'a [VariantDimension],
    cursor: Option<Vec<usize>>,
}

impl<'a> Combinations<'a> {
    #[must_use]
    pub fn new(dimensions: &'a [VariantDimension]) -> Self {
        let cursor = dimensions
            .iter()
            .all(|d| !d.options.is_empty())
            .then(|| vec![0; dimensions.len()]);
        Self { dimensions, cursor }
    }

    /// Size of the full space.
    #[must_use]
    pub fn total(dimensions: &[VariantDimension]) -> usize {
        dimensions.iter().map(|d| d.options.len()).product()
    }

    fn advance(&mut self) {
        let Some(indices) = self.cursor.as_mut() else {
            return;
        };
        for position in (0..indices.len()).rev() {
            indices[position] += 1;
            if indices[position] < self.dimensions[position].options.len() {
                return;
            }
            indices[position] = 0;
        }
        self.cursor = None;
    }
}

impl Iterator for Combinations<'_> {
    type Item = VariantCombination;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.cursor.as_ref()?;
        let choices = self
            .dimensions
            .iter()
            .zip(indices)
            .map(|(dimension, &i)| {
                let option = &dimension.options[i];
                SelectedOption {
                    dimension: dimension.key.clone(),
                    value: option.value.clone(),
                    text: option.text.clone(),
                }
            })
            .collect();
        self.advance();
        Some(VariantCombination { choices })
    }
}

/// Selects every choice of `combination` on the page, in dimension order.
///
/// # Errors
///
/// [`ScraperError::SelectionFailed`] for the first dimension whose option
/// could not be applied. Later dimensions are not attempted.
pub async fn apply_combination<N>(
    navigator: &mut N,
    dimensions: &[VariantDimension],
    combination: &VariantCombination,
) -> Result<(), ScraperError>
where
    N: PageNavigator + ?Sized,
{
    for (dimension, choice) in dimensions.iter().zip(&combination.choices) {
        navigator
            .select_option(&dimension.selector, &choice.value)
            .await
            .map_err(|source| ScraperError::SelectionFailed {
                dimension: dimension.key.clone(),
                value: choice.value.clone(),
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "variants_test.rs"]
mod tests;
