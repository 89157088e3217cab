//! Search-results page extraction
//!
//! Turns a results page into listing stubs. Every `div.products-i` container
//! is one listing; containers without a usable link or id are skipped and
//! counted, never fatal.

use crate::crawler::fetcher::ParsedPage;
use crate::crawler::html::{element_text, first_text, resolve_url, selector};
use crate::model::{ListingStub, UNKNOWN};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Stubs found on one results page
#[derive(Debug, Clone, Default)]
pub struct ListingExtraction {
    /// Unique listings in page order
    pub stubs: Vec<ListingStub>,

    /// Containers that could not be turned into a stub
    pub skipped: usize,
}

struct ListingSelectors {
    container: Selector,
    link: Selector,
    title: Selector,
    price: Selector,
    chip: Selector,
    chip_group: Selector,
    image: Selector,
}

impl ListingSelectors {
    fn compile() -> Option<Self> {
        Some(Self {
            container: selector("div.products-i")?,
            link: selector("a.products-i__link")?,
            title: selector(".products-i__name")?,
            price: selector(".products-i__price")?,
            chip: selector(".products-i__attributes-i")?,
            chip_group: selector(".products-i__attributes")?,
            image: selector("img")?,
        })
    }
}

/// Extracts listing stubs from a results page
///
/// Ids repeated on the page (promoted listings appear twice) keep their
/// first occurrence. Relative links and thumbnails resolve against the
/// page URL.
pub fn extract_listing_page(page: &ParsedPage) -> ListingExtraction {
    let mut extraction = ListingExtraction::default();

    let Some(selectors) = ListingSelectors::compile() else {
        return extraction;
    };

    let document = Html::parse_document(&page.body);
    let mut seen = HashSet::new();

    for container in document.select(&selectors.container) {
        match extract_stub(container, &selectors, &page.url) {
            Ok(stub) => {
                if seen.insert(stub.id.clone()) {
                    extraction.stubs.push(stub);
                } else {
                    tracing::trace!("Listing {} repeated on page", stub.id);
                }
            }
            Err(reason) => {
                extraction.skipped += 1;
                tracing::warn!("Error parsing car listing: {}", reason);
            }
        }
    }

    tracing::debug!(
        "Extracted {} listings from {} ({} skipped)",
        extraction.stubs.len(),
        page.url,
        extraction.skipped
    );

    extraction
}

/// Extracts the listing stubs from a results page, discarding the skip count
pub fn extract_stubs(page: &ParsedPage) -> Vec<ListingStub> {
    extract_listing_page(page).stubs
}

fn extract_stub(
    container: ElementRef<'_>,
    selectors: &ListingSelectors,
    base_url: &Url,
) -> Result<ListingStub, &'static str> {
    let href = container
        .select(&selectors.link)
        .next()
        .and_then(|link| link.value().attr("href"))
        .ok_or("container has no listing link")?;

    let url = resolve_url(href, base_url).ok_or("listing link does not resolve")?;
    let parsed = Url::parse(&url).map_err(|_| "listing link does not resolve")?;
    let id = listing_id_from_url(&parsed).ok_or("no listing id in link")?;

    let mut stub = ListingStub::new(id, url);

    if let Some(title) = first_text(container, &selectors.title) {
        stub.title = title;
    }
    if let Some(price) = first_text(container, &selectors.price) {
        stub.price = price;
    }

    let chips = collect_chips(container, selectors);
    let (year, mileage, engine) = classify_chips(&chips);
    stub.year = year;
    stub.mileage = mileage;
    stub.engine = engine;

    stub.thumbnail = container
        .select(&selectors.image)
        .find_map(|img| {
            let value = img.value();
            value
                .attr("src")
                .filter(|src| !src.trim().is_empty())
                .or_else(|| value.attr("data-src"))
        })
        .and_then(|src| resolve_url(src, base_url))
        .unwrap_or_default();

    Ok(stub)
}

/// Listing id: the leading digits of the first path segment that starts with a digit
///
/// `/autos/8123456-bmw-x5` yields `8123456`.
pub fn listing_id_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|segment| segment.starts_with(|c: char| c.is_ascii_digit()))
        .map(|segment| {
            segment
                .chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
        })
}

fn collect_chips(container: ElementRef<'_>, selectors: &ListingSelectors) -> Vec<String> {
    let mut raw: Vec<String> = container.select(&selectors.chip).map(element_text).collect();

    if raw.is_empty() {
        raw = container
            .select(&selectors.chip_group)
            .map(element_text)
            .collect();
    }

    raw.iter()
        .flat_map(|text| text.split(','))
        .map(str::trim)
        .filter(|chip| !chip.is_empty())
        .map(str::to_string)
        .collect()
}

/// Assigns attribute chips to (year, mileage, engine)
///
/// Each chip goes to the first class it matches, and the first chip of a
/// class wins. Unfilled slots stay `UNKNOWN`.
pub fn classify_chips(chips: &[String]) -> (String, String, String) {
    let mut year = None;
    let mut mileage = None;
    let mut engine = None;

    for chip in chips {
        if is_year(chip) {
            year.get_or_insert_with(|| chip.clone());
        } else if is_mileage(chip) {
            mileage.get_or_insert_with(|| chip.clone());
        } else if is_engine(chip) {
            engine.get_or_insert_with(|| chip.clone());
        }
    }

    let unknown = || UNKNOWN.to_string();
    (
        year.unwrap_or_else(unknown),
        mileage.unwrap_or_else(unknown),
        engine.unwrap_or_else(unknown),
    )
}

fn is_year(chip: &str) -> bool {
    let digits: String = chip.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() != 4 {
        return false;
    }

    let rest = &chip[digits.len()..];
    let in_range = digits
        .parse::<u16>()
        .map(|y| (1900..=2099).contains(&y))
        .unwrap_or(false);

    in_range && !rest.chars().any(char::is_alphabetic)
}

fn is_mileage(chip: &str) -> bool {
    chip.to_lowercase().contains("km")
}

fn is_engine(chip: &str) -> bool {
    let lowered = chip.to_lowercase();
    if ["cc", "cm³", "cm3", "liter", "litre"]
        .iter()
        .any(|unit| lowered.contains(unit))
    {
        return true;
    }

    // A number followed by an `l` unit: "2.0 L", "1.6l"
    let chars: Vec<char> = lowered.chars().collect();
    chars.iter().enumerate().any(|(i, c)| {
        if !c.is_ascii_digit() {
            return false;
        }
        let mut j = i + 1;
        while chars.get(j) == Some(&' ') {
            j += 1;
        }
        chars.get(j) == Some(&'l') && !chars.get(j + 1).map_or(false, |n| n.is_alphabetic())
    })
}
