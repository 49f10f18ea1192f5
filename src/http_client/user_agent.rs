//! Browser catalogs used to build request identities.

use std::fmt;

/// Real browser user agents.
pub const USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 11.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; WOW64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
    // Chrome on Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Linux
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Fedora; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Mobile
    "Mozilla/5.0 (Linux; Android 14; SM-S918B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
];

/// Accept-Language values and the browser families that plausibly send them.
pub const LANGUAGES: &[(&str, &[BrowserFamily])] = &[
    (
        "en-US,en;q=0.9",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox, BrowserFamily::Edge],
    ),
    (
        "en-US,en;q=0.8,fr;q=0.7",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox],
    ),
    (
        "en-GB,en;q=0.9,en-US;q=0.8",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox, BrowserFamily::Edge],
    ),
    ("en-GB,en;q=0.9", &[BrowserFamily::Safari]),
    (
        "en-CA,en;q=0.9,fr-CA;q=0.8,fr;q=0.7",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox],
    ),
    (
        "en-AU,en;q=0.9",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox, BrowserFamily::Safari],
    ),
    (
        "de-DE,de;q=0.9,en;q=0.8",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox],
    ),
    (
        "fr-FR,fr;q=0.9,en;q=0.8",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox],
    ),
    (
        "es-ES,es;q=0.9,en;q=0.8",
        &[BrowserFamily::Chrome, BrowserFamily::Firefox],
    ),
    (
        "ja-JP,ja;q=0.9,en;q=0.8",
        &[BrowserFamily::Chrome, BrowserFamily::Safari],
    ),
    ("ko-KR,ko;q=0.9,en;q=0.8", &[BrowserFamily::Chrome]),
    ("zh-CN,zh;q=0.9,en;q=0.8", &[BrowserFamily::Chrome]),
];

/// Language used when no catalog entry matches a family.
pub const DEFAULT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Referer candidates. The empty entry means direct navigation.
pub const REFERERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.google.com/search?q=phone+number+lookup",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
    "https://search.yahoo.com/",
    "https://www.facebook.com/",
    "https://twitter.com/",
    "",
    "https://www.robokiller.com/",
];

/// Browser family inferred from a user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserFamily {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl BrowserFamily {
    /// Infer the family by marker substrings.
    ///
    /// Precedence: Firefox, then Safari without Chrome, then Edge, else Chrome.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Firefox") {
            Self::Firefox
        } else if user_agent.contains("Safari") && !user_agent.contains("Chrome") {
            Self::Safari
        } else if user_agent.contains("Edg") {
            Self::Edge
        } else {
            Self::Chrome
        }
    }

    /// Whether this family sends Chromium client-hint headers.
    pub fn is_chromium(&self) -> bool {
        matches!(self, Self::Chrome | Self::Edge)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
        }
    }
}

impl fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept-Language values compatible with a family.
pub fn languages_for(family: BrowserFamily) -> Vec<&'static str> {
    LANGUAGES
        .iter()
        .filter(|(_, families)| families.contains(&family))
        .map(|(lang, _)| *lang)
        .collect()
}
