use serde::{Deserialize, Serialize};

/// Label used for the single implicit combination of a product that has no
/// selectable dimensions.
pub const DEFAULT_VARIANT_LABEL: &str = "Default";

/// Canonical absolute URL of a product detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductReference(String);

impl ProductReference {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One selectable entry of a dimension: the raw `value` submitted to the
/// control and the `text` shown to shoppers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOption {
    pub value: String,
    pub text: String,
}

/// An independent selection control discovered on a product page. Placeholder
/// entries are filtered out before one of these is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDimension {
    /// Column key: the configured key, or the control's `name` for the generic fallback.
    pub key: String,
    /// Selector addressing the `<select>` control.
    pub selector: String,
    pub options: Vec<VariantOption>,
}

/// One concrete choice for one dimension of a combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub dimension: String,
    pub value: String,
    pub text: String,
}

/// One option chosen per dimension, in dimension-declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCombination {
    pub choices: Vec<SelectedOption>,
}

impl VariantCombination {
    /// Identity of the combination: the ordered tuple of raw values.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        self.choices.iter().map(|c| c.value.as_str()).collect()
    }

    /// Human-readable label, e.g. `"Sydney / 1200mm"`.
    #[must_use]
    pub fn label(&self) -> String {
        self.choices
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }

    /// Display text chosen for `dimension`, if this combination covers it.
    #[must_use]
    pub fn text_for(&self, dimension: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.dimension == dimension)
            .map(|c| c.text.as_str())
    }
}

/// A normalized price observation for one product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub product_url: ProductReference,
    pub product_name: String,
    /// `None` for the implicit default combination of a flat-price product.
    pub combination: Option<VariantCombination>,
    /// Normalized numeric string, or empty when no price is shown.
    pub price: String,
    pub available: bool,
}

impl PriceQuote {
    /// `"Default"` for flat-price products, otherwise the combination label.
    #[must_use]
    pub fn variant_label(&self) -> String {
        self.combination
            .as_ref()
            .map_or_else(|| DEFAULT_VARIANT_LABEL.to_string(), VariantCombination::label)
    }
}

/// Counters accumulated over a run and reported at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pages_crawled: usize,
    pub products_discovered: usize,
    pub products_visited: usize,
    pub products_failed: usize,
    pub combinations_attempted: usize,
    pub combinations_recorded: usize,
    /// Selection failures: a dimension's option could not be applied.
    pub combinations_skipped: usize,
    pub combinations_timed_out: usize,
    pub combinations_unavailable: usize,
    pub cancelled: bool,
}

impl RunSummary {
    /// Folds per-product counters into the run totals.
    pub fn absorb(&mut self, other: &RunSummary) {
        self.pages_crawled += other.pages_crawled;
        self.products_discovered += other.products_discovered;
        self.products_visited += other.products_visited;
        self.products_failed += other.products_failed;
        self.combinations_attempted += other.combinations_attempted;
        self.combinations_recorded += other.combinations_recorded;
        self.combinations_skipped += other.combinations_skipped;
        self.combinations_timed_out += other.combinations_timed_out;
        self.combinations_unavailable += other.combinations_unavailable;
        self.cancelled |= other.cancelled;
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pages crawled: {}, products visited: {}/{} ({} failed), combinations recorded: {}, skipped: {}, timed out: {}, unavailable: {}",
            self.pages_crawled,
            self.products_visited,
            self.products_discovered,
            self.products_failed,
            self.combinations_recorded,
            self.combinations_skipped,
            self.combinations_timed_out,
            self.combinations_unavailable,
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
