use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel for stub fields the listing page did not provide
pub const UNKNOWN: &str = "N/A";

/// Minimal listing data extracted from a search-results page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStub {
    /// Stable upstream identifier
    pub id: String,
    pub title: String,
    pub price: String,
    pub year: String,
    pub mileage: String,
    pub engine: String,
    /// Absolute URL of the detail page
    pub url: String,
    /// Absolute thumbnail URL, empty when the container had no image
    pub thumbnail: String,
}

impl ListingStub {
    /// Creates a stub with every display field set to [`UNKNOWN`]
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: UNKNOWN.to_string(),
            price: UNKNOWN.to_string(),
            year: UNKNOWN.to_string(),
            mileage: UNKNOWN.to_string(),
            engine: UNKNOWN.to_string(),
            url: url.into(),
            thumbnail: String::new(),
        }
    }
}

/// Attributes scraped from a listing's detail page
///
/// Unavailable fields are empty strings, empty lists or empty maps. A cache
/// entry is exactly one of these values and is always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailAttributes {
    pub city: String,
    pub brand: String,
    pub model: String,
    pub body_type: String,
    pub color: String,
    pub engine_details: String,
    pub transmission: String,
    pub drivetrain: String,
    pub is_new: String,
    pub seats: String,
    pub owners: String,
    pub condition: String,
    pub market: String,
    pub description: String,

    /// Distinct image URLs in discovery order
    pub images: Vec<String>,

    /// Every scraped label/value pair, including labels without a typed field
    pub specifications: BTreeMap<String, String>,
}

impl DetailAttributes {
    /// Returns true if nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A listing stub merged with its detail attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(flatten)]
    pub stub: ListingStub,

    #[serde(flatten)]
    pub details: DetailAttributes,
}

impl ListingRecord {
    /// A record carrying only the stub fields
    pub fn from_stub(stub: ListingStub) -> Self {
        Self {
            stub,
            details: DetailAttributes::default(),
        }
    }

    pub fn with_details(stub: ListingStub, details: DetailAttributes) -> Self {
        Self { stub, details }
    }

    pub fn id(&self) -> &str {
        &self.stub.id
    }
}

impl fmt::Display for ListingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\nPrice: {}\nYear: {}\nMileage: {}\nEngine: {}",
            self.stub.title, self.stub.price, self.stub.year, self.stub.mileage, self.stub.engine
        )?;
        if !self.details.city.is_empty() {
            write!(f, "\nCity: {}", self.details.city)?;
        }
        if !self.details.color.is_empty() {
            write!(f, "\nColor: {}", self.details.color)?;
        }
        if !self.details.transmission.is_empty() {
            write!(f, "\nTransmission: {}", self.details.transmission)?;
        }
        write!(f, "\n{}", self.stub.url)
    }
}
