//! Normalized phone number identifiers.

use std::fmt;

use serde::{Serialize, Serializer};

/// Number of digits in a normalized North American number.
pub const PHONE_DIGITS: usize = 10;

/// A normalized 10-digit phone number used as the lookup key.
///
/// Only constructible through [`PhoneNumber::normalize`], so every value holds
/// exactly ten ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize a raw cell into a phone number.
    ///
    /// Strips every non-digit character, then drops a leading `1` country
    /// code from 11-digit results. Returns `None` unless exactly ten digits
    /// remain.
    pub fn normalize(raw: &str) -> Option<Self> {
        let digits = clean_digits(raw);
        if digits.len() == PHONE_DIGITS {
            Some(Self(digits))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for PhoneNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Keep only ASCII digits, dropping a leading US country code from 11-digit input.
pub fn clean_digits(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == PHONE_DIGITS + 1 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}
