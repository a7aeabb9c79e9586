//! URL resolution for links harvested from listing pages.

use url::Url;

/// Resolves `href` against `base_url` into a canonical absolute URL.
///
/// The fragment is dropped so `/product/x/#reviews` and `/product/x/`
/// dedupe to the same reference. Returns `None` for empty hrefs, `javascript:`
/// and `mailto:` links, or when `base_url` itself cannot be parsed.
#[must_use]
pub fn resolve_link(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(e) => {
            tracing::warn!(
                base_url,
                error = %e,
                "could not parse base URL; dropping relative link"
            );
            return None;
        }
    };
    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
