//! Crawler module for fetching and extracting listings
//!
//! This module contains everything that talks to the site, including:
//! - Request pacing and browser identity rotation
//! - HTTP fetching with retry logic
//! - Search-results and detail page extraction

mod backoff;
mod detail;
mod fetcher;
mod html;
mod identity;
mod listing;
mod scheduler;

pub use backoff::BackoffPolicy;
pub use detail::{parse_detail_page, DetailExtractor};
pub use fetcher::{build_http_client, parse_retry_after, FetchError, PageFetcher, ParsedPage};
pub use html::{fold_label, resolve_url};
pub use identity::{
    Browser, Identity, IdentityPool, IdentityProfile, Platform, DESKTOP_PROFILES, MOBILE_PROFILES,
};
pub use listing::{
    classify_chips, extract_listing_page, extract_stubs, listing_id_from_url, ListingExtraction,
};
pub use scheduler::RequestScheduler;
