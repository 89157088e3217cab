//! Browser identities
//!
//! An identity is a user agent plus the request headers a real browser of
//! that family would send with it. Headers are generated from the profile
//! rather than sniffed from the user-agent string, so a Firefox identity never
//! carries Chromium client hints and a desktop identity never carries a
//! viewport hint.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, DNT,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

const ACCEPT_DESKTOP: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_MOBILE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";
const LANGUAGES: &str = "en-US,en;q=0.9,az;q=0.8,tr;q=0.7";

/// Probability that an identity asks for a fresh copy (`Cache-Control: max-age=0`)
const CACHE_BUST_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl Browser {
    /// Chromium browsers send `sec-ch-ua` client hints
    pub fn is_chromium(self) -> bool {
        matches!(self, Browser::Chrome | Browser::Edge)
    }

    fn brand(self) -> Option<&'static str> {
        match self {
            Browser::Chrome => Some("Google Chrome"),
            Browser::Edge => Some("Microsoft Edge"),
            Browser::Firefox | Browser::Safari => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
}

impl Platform {
    /// Value of the `sec-ch-ua-platform` hint
    pub fn client_hint(self) -> &'static str {
        match self {
            Platform::Windows => "\"Windows\"",
            Platform::MacOs => "\"macOS\"",
            Platform::Linux => "\"Linux\"",
            Platform::Android => "\"Android\"",
            Platform::Ios => "\"iOS\"",
        }
    }
}

/// A static browser descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityProfile {
    pub user_agent: &'static str,
    pub browser: Browser,
    pub platform: Platform,
    /// Major version advertised in client hints
    pub version: u16,
    pub mobile: bool,
}

const fn desktop(
    user_agent: &'static str,
    browser: Browser,
    platform: Platform,
    version: u16,
) -> IdentityProfile {
    IdentityProfile {
        user_agent,
        browser,
        platform,
        version,
        mobile: false,
    }
}

const fn mobile(
    user_agent: &'static str,
    browser: Browser,
    platform: Platform,
    version: u16,
) -> IdentityProfile {
    IdentityProfile {
        user_agent,
        browser,
        platform,
        version,
        mobile: true,
    }
}

pub const DESKTOP_PROFILES: &[IdentityProfile] = &[
    desktop(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        Browser::Chrome,
        Platform::Windows,
        120,
    ),
    desktop(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        Browser::Chrome,
        Platform::Windows,
        119,
    ),
    desktop(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        Browser::Chrome,
        Platform::MacOs,
        120,
    ),
    desktop(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        Browser::Chrome,
        Platform::Linux,
        120,
    ),
    desktop(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        Browser::Firefox,
        Platform::Windows,
        121,
    ),
    desktop(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
        Browser::Firefox,
        Platform::MacOs,
        121,
    ),
    desktop(
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
        Browser::Firefox,
        Platform::Linux,
        121,
    ),
    desktop(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        Browser::Safari,
        Platform::MacOs,
        17,
    ),
    desktop(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
        Browser::Safari,
        Platform::MacOs,
        17,
    ),
    desktop(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        Browser::Edge,
        Platform::Windows,
        120,
    ),
];

pub const MOBILE_PROFILES: &[IdentityProfile] = &[
    mobile(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
        Browser::Safari,
        Platform::Ios,
        17,
    ),
    mobile(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
        Browser::Safari,
        Platform::Ios,
        16,
    ),
    mobile(
        "Mozilla/5.0 (Linux; Android 13; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        Browser::Chrome,
        Platform::Android,
        120,
    ),
    mobile(
        "Mozilla/5.0 (Linux; Android 12; SM-G975F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Mobile Safari/537.36",
        Browser::Chrome,
        Platform::Android,
        119,
    ),
    mobile(
        "Mozilla/5.0 (iPad; CPU OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
        Browser::Safari,
        Platform::Ios,
        17,
    ),
];

/// A profile with its generated header set
#[derive(Debug, Clone)]
pub struct Identity {
    profile: IdentityProfile,
    headers: HeaderMap,
}

impl Identity {
    /// Builds the header set for `profile`
    ///
    /// The randomized parts (viewport width, cache busting) are drawn once
    /// here and stay fixed for the lifetime of the identity.
    pub fn generate<R: Rng + ?Sized>(profile: IdentityProfile, rng: &mut R) -> Self {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(profile.user_agent));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(if profile.mobile {
                ACCEPT_MOBILE
            } else {
                ACCEPT_DESKTOP
            }),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(LANGUAGES));
        headers.insert(DNT, HeaderValue::from_static("1"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("document"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("navigate"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static("none"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-user"),
            HeaderValue::from_static("?1"),
        );

        if let Some(brand) = profile.browser.brand() {
            let hint = format!(
                "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"{v}\", \"{brand}\";v=\"{v}\"",
                v = profile.version
            );
            if let Ok(value) = HeaderValue::from_str(&hint) {
                headers.insert(HeaderName::from_static("sec-ch-ua"), value);
            }
            headers.insert(
                HeaderName::from_static("sec-ch-ua-mobile"),
                HeaderValue::from_static(if profile.mobile { "?1" } else { "?0" }),
            );
            headers.insert(
                HeaderName::from_static("sec-ch-ua-platform"),
                HeaderValue::from_static(profile.platform.client_hint()),
            );

            if profile.mobile {
                let width: u16 = rng.gen_range(360..=414);
                headers.insert(HeaderName::from_static("viewport-width"), width.into());
            }
        }

        if rng.gen_bool(CACHE_BUST_PROBABILITY) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        }

        Self { profile, headers }
    }

    pub fn profile(&self) -> &IdentityProfile {
        &self.profile
    }

    pub fn user_agent(&self) -> &'static str {
        self.profile.user_agent
    }

    pub fn is_mobile(&self) -> bool {
        self.profile.mobile
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// The set of profiles identities are drawn from
#[derive(Debug, Clone)]
pub struct IdentityPool {
    desktop: &'static [IdentityProfile],
    mobile: &'static [IdentityProfile],
    mobile_probability: f64,
}

impl IdentityPool {
    pub fn new(mobile_probability: f64) -> Self {
        Self {
            desktop: DESKTOP_PROFILES,
            mobile: MOBILE_PROFILES,
            mobile_probability: mobile_probability.clamp(0.0, 1.0),
        }
    }

    /// Draws a fresh identity
    ///
    /// When `avoid` is given, a profile with that user agent is only chosen
    /// if it is the only one in the selected class.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, avoid: Option<&str>) -> Identity {
        let class = if rng.gen_bool(self.mobile_probability) {
            self.mobile
        } else {
            self.desktop
        };

        let candidates: Vec<&IdentityProfile> = class
            .iter()
            .filter(|p| Some(p.user_agent) != avoid)
            .collect();

        let profile = candidates
            .choose(rng)
            .copied()
            .or_else(|| class.first())
            .copied()
            .unwrap_or(DESKTOP_PROFILES[0]);

        tracing::trace!("Drew identity {}", profile.user_agent);
        Identity::generate(profile, rng)
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new(0.1)
    }
}
