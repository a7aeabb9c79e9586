//! Price text normalization.

/// Strips whitespace and every configured currency symbol from `raw`.
///
/// What remains is either a plain numeric string (thousands separators are
/// kept: `"1,234.50"`) or empty. Empty is a meaningful result: the product is
/// priced on request or the price element was absent.
///
/// Longer symbols are stripped first, so `"AU$"` is removed whole even when
/// `"$"` is also configured.
#[must_use]
pub fn normalize_price(raw: &str, currency_symbols: &[String]) -> String {
    let mut symbols: Vec<&str> = currency_symbols
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    symbols.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut text = raw.to_string();
    for symbol in symbols {
        text = text.replace(symbol, "");
    }
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// First non-empty text among price-element texts, in document order.
///
/// The product's own price precedes related-product and cart prices on the
/// page, so later matches are never preferred.
#[must_use]
pub fn first_displayed_price<'a, I>(texts: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    texts.into_iter().map(str::trim).find(|t| !t.is_empty())
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
