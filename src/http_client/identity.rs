//! Randomized, internally consistent request identities.
//!
//! An identity is a plain value: a user agent, a matching Accept-Language,
//! browser-specific headers and an optional referer. Generation takes the
//! randomness source as an argument so it can run from any task without
//! shared state.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use super::user_agent::{
    languages_for, BrowserFamily, DEFAULT_LANGUAGE, REFERERS, USER_AGENTS,
};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const FETCH_SITES: &[&str] = &["none", "same-origin", "cross-site"];

/// Headers presented for one request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_agent: &'static str,
    pub family: BrowserFamily,
    pub accept_language: &'static str,
    /// `None` for direct navigation.
    pub referer: Option<&'static str>,
    /// Every header in send order, including User-Agent.
    pub headers: Vec<(&'static str, String)>,
}

impl RequestIdentity {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Probabilities controlling identity generation.
#[derive(Debug, Clone, Copy)]
pub struct IdentityGenerator {
    referer_chance: f64,
    shuffle_chance: f64,
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new(0.5, 0.3)
    }
}

impl IdentityGenerator {
    pub fn new(referer_chance: f64, shuffle_chance: f64) -> Self {
        Self {
            referer_chance: referer_chance.clamp(0.0, 1.0),
            shuffle_chance: shuffle_chance.clamp(0.0, 1.0),
        }
    }

    /// Build one identity from the given randomness source.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RequestIdentity {
        let user_agent = *USER_AGENTS.choose(rng).unwrap_or(&USER_AGENTS[0]);
        let family = BrowserFamily::from_user_agent(user_agent);
        let accept_language = languages_for(family)
            .choose(rng)
            .copied()
            .unwrap_or(DEFAULT_LANGUAGE);

        let dnt = if rng.random_bool(0.5) { "1" } else { "0" };
        let mut headers: Vec<(&'static str, String)> = vec![
            ("Accept", ACCEPT.to_string()),
            ("Accept-Language", accept_language.to_string()),
            ("Accept-Encoding", "gzip, deflate, br".to_string()),
            ("DNT", dnt.to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Connection", "keep-alive".to_string()),
            ("Cache-Control", "max-age=0".to_string()),
        ];

        if family.is_chromium() {
            let fetch_site = FETCH_SITES.choose(rng).copied().unwrap_or("none");
            headers.extend([
                (
                    "Sec-Ch-Ua",
                    "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\"".to_string(),
                ),
                ("Sec-Ch-Ua-Mobile", "?0".to_string()),
                ("Sec-Ch-Ua-Platform", "\"Windows\"".to_string()),
                ("Sec-Fetch-Dest", "document".to_string()),
                ("Sec-Fetch-Mode", "navigate".to_string()),
                ("Sec-Fetch-Site", fetch_site.to_string()),
                ("Sec-Fetch-User", "?1".to_string()),
            ]);
        } else if family == BrowserFamily::Firefox {
            headers.push(("TE", "trailers".to_string()));
        }

        let mut referer = None;
        if rng.random_bool(self.referer_chance) {
            let chosen = REFERERS.choose(rng).copied().unwrap_or("");
            if !chosen.is_empty() {
                referer = Some(chosen);
                headers.push(("Referer", chosen.to_string()));
            }
        }

        // Some detectors look at order; User-Agent goes last unless shuffled.
        headers.push(("User-Agent", user_agent.to_string()));
        if rng.random_bool(self.shuffle_chance) {
            headers.shuffle(rng);
        }

        RequestIdentity {
            user_agent,
            family,
            accept_language,
            referer,
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::user_agent::LANGUAGES;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_identity_is_consistent() {
        let generator = IdentityGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let identity = generator.generate(&mut rng);
            assert_eq!(
                identity.family,
                BrowserFamily::from_user_agent(identity.user_agent)
            );
            let allowed = LANGUAGES
                .iter()
                .find(|(lang, _)| *lang == identity.accept_language)
                .map(|(_, families)| families.contains(&identity.family))
                .unwrap_or(identity.accept_language == DEFAULT_LANGUAGE);
            assert!(allowed, "{:?}", identity);
            assert_eq!(identity.header("user-agent"), Some(identity.user_agent));
            assert_eq!(
                identity.header("Accept-Language"),
                Some(identity.accept_language)
            );
        }
    }

    #[test]
    fn test_family_specific_headers() {
        let generator = IdentityGenerator::new(0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(42);
        let mut saw = (false, false, false);
        for _ in 0..300 {
            let identity = generator.generate(&mut rng);
            match identity.family {
                BrowserFamily::Chrome | BrowserFamily::Edge => {
                    saw.0 = true;
                    let site = identity.header("Sec-Fetch-Site").unwrap();
                    assert!(FETCH_SITES.contains(&site));
                    assert!(identity.header("TE").is_none());
                }
                BrowserFamily::Firefox => {
                    saw.1 = true;
                    assert_eq!(identity.header("TE"), Some("trailers"));
                    assert!(identity.header("Sec-Ch-Ua").is_none());
                }
                BrowserFamily::Safari => {
                    saw.2 = true;
                    assert!(identity.header("Sec-Ch-Ua").is_none());
                    assert!(identity.header("TE").is_none());
                }
            }
        }
        assert!(saw.0 && saw.1 && saw.2);
    }

    #[test]
    fn test_no_referer_or_shuffle_when_disabled() {
        let generator = IdentityGenerator::new(0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let identity = generator.generate(&mut rng);
            assert!(identity.referer.is_none());
            assert!(identity.header("Referer").is_none());
            assert_eq!(identity.headers[0].0, "Accept");
            assert_eq!(identity.headers.last().unwrap().0, "User-Agent");
        }
    }

    #[test]
    fn test_referer_always_offered_when_enabled() {
        let generator = IdentityGenerator::new(1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        let mut attached = 0;
        for _ in 0..100 {
            let identity = generator.generate(&mut rng);
            if let Some(referer) = identity.referer {
                attached += 1;
                assert!(REFERERS.contains(&referer));
                assert_eq!(identity.header("Referer"), Some(referer));
            }
        }
        // The empty "direct" entry means not every draw attaches one.
        assert!(attached > 50 && attached < 100);
    }

    #[test]
    fn test_shuffle_keeps_header_set() {
        let plain = IdentityGenerator::new(0.0, 0.0).generate(&mut StdRng::seed_from_u64(9));
        let shuffled = IdentityGenerator::new(0.0, 1.0).generate(&mut StdRng::seed_from_u64(9));
        let mut a: Vec<_> = plain.headers.iter().map(|(k, _)| *k).collect();
        let mut b: Vec<_> = shuffled.headers.iter().map(|(k, _)| *k).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }
}
