//! Detail page extraction
//!
//! Enriches a listing stub with the attributes found on its detail page.
//! Results are cached per listing id, so each detail page is fetched at most
//! once; a failed fetch yields the bare stub and leaves the cache untouched.

use crate::cache::DetailCache;
use crate::crawler::fetcher::{PageFetcher, ParsedPage};
use crate::crawler::html::{element_text, first_text, fold_label, resolve_url, selector};
use crate::model::{DetailAttributes, ListingRecord, ListingStub};
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Attributes the detail page can fill in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    City,
    Brand,
    Model,
    BodyType,
    Color,
    EngineDetails,
    Transmission,
    Drivetrain,
    IsNew,
    Seats,
    Owners,
    Condition,
    Market,
}

/// Panel labels in the order the site lists them
///
/// Labels without a field only delimit neighbouring values; they are still
/// kept in the specifications map.
const PANEL_LABELS: &[(&str, Option<Field>)] = &[
    ("Şəhər", Some(Field::City)),
    ("Marka", Some(Field::Brand)),
    ("Model", Some(Field::Model)),
    ("Buraxılış ili", None),
    ("Ban növü", Some(Field::BodyType)),
    ("Rəng", Some(Field::Color)),
    ("Mühərrik", Some(Field::EngineDetails)),
    ("Yürüş", None),
    ("Sürətlər qutusu", Some(Field::Transmission)),
    ("Ötürücü", Some(Field::Drivetrain)),
    ("Yeni", Some(Field::IsNew)),
    ("Yerlərin sayı", Some(Field::Seats)),
    ("Sahiblər", Some(Field::Owners)),
    ("Vəziyyəti", Some(Field::Condition)),
    ("Hansı bazar üçün yığılıb", Some(Field::Market)),
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "div.product-description",
    "div.product-text",
    "div.description",
    "div.auto-description",
];

const IMAGE_SELECTORS: &[&str] = &[
    "img.slider-img",
    "img.product-photo",
    "div.product-photos img",
    "div.slider img",
    r#"img[src*="cars/"]"#,
    r#"img[src*="autos/"]"#,
];

const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-lazy"];

/// Fetches and caches detail attributes for listing stubs
pub struct DetailExtractor {
    fetcher: Arc<PageFetcher>,
    cache: Arc<Mutex<DetailCache>>,
}

impl DetailExtractor {
    pub fn new(fetcher: Arc<PageFetcher>, cache: Arc<Mutex<DetailCache>>) -> Self {
        Self { fetcher, cache }
    }

    pub fn cache(&self) -> &Arc<Mutex<DetailCache>> {
        &self.cache
    }

    /// Returns `stub` merged with its detail attributes
    ///
    /// A cache hit makes no network request. When the detail page cannot be
    /// fetched the record carries only the stub fields.
    pub async fn extract_detail(&self, stub: ListingStub) -> ListingRecord {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&stub.id)
            .cloned();

        if let Some(details) = cached {
            tracing::debug!("Used cached data for car {}", stub.id);
            return ListingRecord::with_details(stub, details);
        }

        tracing::info!("Fetching detailed info for car {}", stub.id);

        let page = match self.fetcher.fetch(&stub.url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Could not fetch details for car {}: {}", stub.id, e);
                return ListingRecord::from_stub(stub);
            }
        };

        let details = parse_detail_page(&page);

        if details.specifications.is_empty() {
            tracing::warn!("No specifications found for car {}", stub.id);
        } else {
            tracing::info!(
                "Extracted {} specifications for car {}",
                details.specifications.len(),
                stub.id
            );
        }

        let stored = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(&stub.id, details.clone());
        if let Err(e) = stored {
            tracing::warn!("Could not persist cache entry {}: {}", stub.id, e);
        }

        ListingRecord::with_details(stub, details)
    }
}

/// Extracts every detail attribute from a detail page
pub fn parse_detail_page(page: &ParsedPage) -> DetailAttributes {
    let document = Html::parse_document(&page.body);
    let mut details = DetailAttributes::default();

    let specifications = extract_specifications(&document);
    for (label, value) in &specifications {
        if let Some(slot) = known_field(&mut details, label) {
            *slot = value.clone();
        }
    }
    details.specifications = specifications;

    details.description = extract_description(&document).unwrap_or_default();
    details.images = extract_images(&document, &page.url);

    details
}

fn known_field<'a>(details: &'a mut DetailAttributes, label: &str) -> Option<&'a mut String> {
    let key = fold_label(label);
    let field = PANEL_LABELS
        .iter()
        .find(|(known, _)| fold_label(known) == key)
        .and_then(|(_, field)| *field)?;

    Some(match field {
        Field::City => &mut details.city,
        Field::Brand => &mut details.brand,
        Field::Model => &mut details.model,
        Field::BodyType => &mut details.body_type,
        Field::Color => &mut details.color,
        Field::EngineDetails => &mut details.engine_details,
        Field::Transmission => &mut details.transmission,
        Field::Drivetrain => &mut details.drivetrain,
        Field::IsNew => &mut details.is_new,
        Field::Seats => &mut details.seats,
        Field::Owners => &mut details.owners,
        Field::Condition => &mut details.condition,
        Field::Market => &mut details.market,
    })
}

/// Label/value pairs from the properties panel, falling back to table rows
fn extract_specifications(document: &Html) -> BTreeMap<String, String> {
    let panel = selector("div.product-properties")
        .and_then(|panel| document.select(&panel).next());

    if let Some(panel) = panel {
        let specifications = panel_items(panel);
        if !specifications.is_empty() {
            return specifications;
        }

        let specifications = scan_panel_text(&element_text(panel));
        if !specifications.is_empty() {
            return specifications;
        }
    }

    table_rows(document)
}

fn panel_items(panel: ElementRef<'_>) -> BTreeMap<String, String> {
    let mut specifications = BTreeMap::new();

    let (Some(item_sel), Some(label_sel), Some(value_sel)) = (
        selector("div.product-properties-i"),
        selector("label"),
        selector(".product-properties-i-value"),
    ) else {
        return specifications;
    };

    for item in panel.select(&item_sel) {
        if let (Some(label), Some(value)) =
            (first_text(item, &label_sel), first_text(item, &value_sel))
        {
            specifications.insert(label, value);
        }
    }

    specifications
}

/// Splits flattened panel text on the known labels
///
/// Labels are searched in display order; each value runs up to the next
/// label found. Matching ignores the schwa and dotless-i variants.
fn scan_panel_text(text: &str) -> BTreeMap<String, String> {
    let original: Vec<char> = text.chars().collect();
    let folded: Vec<char> = original.iter().map(|&c| fold_char(c)).collect();

    let mut found: Vec<(&str, usize, usize)> = Vec::new();
    let mut cursor = 0;
    for &(label, _) in PANEL_LABELS {
        let needle: Vec<char> = label.chars().map(fold_char).collect();
        if let Some(start) = find_chars(&folded, &needle, cursor) {
            cursor = start + needle.len();
            found.push((label, start, cursor));
        }
    }

    let mut specifications = BTreeMap::new();
    for (i, (label, _, value_start)) in found.iter().enumerate() {
        let value_end = found
            .get(i + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(original.len());
        let value: String = original[*value_start..value_end].iter().collect();
        let value = value.trim().trim_start_matches(':').trim();
        if !value.is_empty() {
            specifications.insert(label.to_string(), value.to_string());
        }
    }

    specifications
}

fn fold_char(c: char) -> char {
    match c {
        'ә' => 'ə',
        'Ә' => 'Ə',
        'ı' => 'i',
        _ => c,
    }
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn table_rows(document: &Html) -> BTreeMap<String, String> {
    let mut specifications = BTreeMap::new();

    let (Some(row), Some(cell)) = (selector("tr"), selector("td, th")) else {
        return specifications;
    };

    for element in document.select(&row) {
        let cells: Vec<String> = element.select(&cell).take(2).map(element_text).collect();
        if let [key, value] = cells.as_slice() {
            if !key.is_empty() && !value.is_empty() {
                specifications.insert(key.clone(), value.clone());
            }
        }
    }

    specifications
}

fn extract_description(document: &Html) -> Option<String> {
    DESCRIPTION_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|description| {
            document
                .select(&description)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty())
        })
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();

    for css in IMAGE_SELECTORS {
        let Some(image) = selector(css) else {
            continue;
        };

        for element in document.select(&image) {
            let source = IMAGE_ATTRIBUTES
                .iter()
                .filter_map(|attr| element.value().attr(attr))
                .map(str::trim)
                .find(|src| !src.is_empty() && !src.to_ascii_lowercase().starts_with("data:"));

            if let Some(url) = source.and_then(|src| resolve_url(src, base_url)) {
                if !images.contains(&url) {
                    images.push(url);
                }
            }
        }
    }

    images
}
