//! Listing data model
//!
//! - `ListingStub`: the lightweight data available on a search-results page
//! - `DetailAttributes`: everything a detail page adds (this is what the
//!   detail cache stores)
//! - `ListingRecord`: a stub merged with its detail attributes

mod listing;

pub use listing::{DetailAttributes, ListingRecord, ListingStub, UNKNOWN};
