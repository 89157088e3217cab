//! Shared HTML helpers for the listing and detail extractors

use scraper::{ElementRef, Selector};
use url::Url;

/// Parses a CSS selector, logging selectors that fail to parse
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::error!("Invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

/// Text content of an element with whitespace runs collapsed to one space
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first descendant matching `selector`, if it is not blank
pub fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Resolves an `href`/`src` value against the page it was found on
///
/// Returns None for:
/// - empty values and fragment-only links
/// - javascript:, mailto:, tel: and data: URIs
/// - values that do not resolve to an http(s) URL
pub fn resolve_url(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}

/// Normalizes a field label for comparison
///
/// Folds the two lookalike schwa code points and the dotless i, lowercases,
/// trims and drops a trailing colon.
pub fn fold_label(label: &str) -> String {
    let folded: String = label
        .chars()
        .map(|c| match c {
            'ә' => 'ə',
            'Ә' => 'Ə',
            'ı' => 'i',
            _ => c,
        })
        .collect();

    folded
        .to_lowercase()
        .trim()
        .trim_end_matches(':')
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn base_url() -> Url {
        Url::parse("https://turbo.az/autos?page=1").unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve_url("/autos/123-bmw", &base_url()),
            Some("https://turbo.az/autos/123-bmw".to_string())
        );
    }

    #[test]
    fn test_resolve_protocol_relative() {
        assert_eq!(
            resolve_url("//turbo.azstatic.com/uploads/f460x343/1.jpg", &base_url()),
            Some("https://turbo.azstatic.com/uploads/f460x343/1.jpg".to_string())
        );
    }

    #[test]
    fn test_resolve_keeps_absolute() {
        assert_eq!(
            resolve_url("http://other.example/x", &base_url()),
            Some("http://other.example/x".to_string())
        );
    }

    #[test]
    fn test_resolve_rejects_special_schemes() {
        let base = base_url();
        assert_eq!(resolve_url("javascript:void(0)", &base), None);
        assert_eq!(resolve_url("mailto:a@b.c", &base), None);
        assert_eq!(resolve_url("tel:+994", &base), None);
        assert_eq!(resolve_url("data:image/gif;base64,R0lG", &base), None);
        assert_eq!(resolve_url("DATA:image/gif;base64,R0lG", &base), None);
        assert_eq!(resolve_url("ftp://files.example/x", &base), None);
        assert_eq!(resolve_url("#top", &base), None);
        assert_eq!(resolve_url("   ", &base), None);
    }

    #[test]
    fn test_element_text_collapses_whitespace() {
        let html = Html::parse_fragment("<div>  25 500\n   <span>AZN</span> </div>");
        let div = selector("div").unwrap();
        let element = html.select(&div).next().unwrap();
        assert_eq!(element_text(element), "25 500 AZN");
    }

    #[test]
    fn test_first_text_skips_blank() {
        let html = Html::parse_fragment("<div><p class='x'>   </p></div>");
        let div = selector("div").unwrap();
        let element = html.select(&div).next().unwrap();
        assert_eq!(first_text(element, &selector(".x").unwrap()), None);
    }

    #[test]
    fn test_fold_label() {
        assert_eq!(fold_label("Yerlәrin sayı"), fold_label("Yerlərin sayı"));
        assert_eq!(fold_label("Hansi bazar"), fold_label("Hansı bazar"));
        assert_eq!(fold_label("  Şəhər: "), "şəhər");
        assert_eq!(fold_label("Marka"), "marka");
    }

    #[test]
    fn test_invalid_selector() {
        assert!(selector("div[").is_none());
    }
}
