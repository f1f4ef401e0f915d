//! Parcel and building identifiers.
//!
//! A parcel identifier (BBL) is a fixed-width numeric code whose leading
//! digit names one of five regions. It is the authoritative identity signal
//! when present. The building identification number (BIN) has the same
//! leading-digit structure over seven digits and is carried as an attribute.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::report::DegradeReason;

/// Width of a building identification number.
pub const BIN_DIGITS: usize = 7;

/// Region denoted by an identifier's leading digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Leading digit 1.
    Manhattan,
    /// Leading digit 2.
    Bronx,
    /// Leading digit 3.
    Brooklyn,
    /// Leading digit 4.
    Queens,
    /// Leading digit 5.
    StatenIsland,
}

impl Region {
    /// Maps a leading digit to its region.
    #[must_use]
    pub const fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(Self::Manhattan),
            2 => Some(Self::Bronx),
            3 => Some(Self::Brooklyn),
            4 => Some(Self::Queens),
            5 => Some(Self::StatenIsland),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manhattan => write!(f, "manhattan"),
            Self::Bronx => write!(f, "bronx"),
            Self::Brooklyn => write!(f, "brooklyn"),
            Self::Queens => write!(f, "queens"),
            Self::StatenIsland => write!(f, "staten_island"),
        }
    }
}

/// Accepted shape of a parcel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelFormat {
    /// Exact digit count.
    pub digits: usize,
    /// Valid leading digits (region codes).
    pub leading_digits: BTreeSet<u8>,
}

impl Default for ParcelFormat {
    fn default() -> Self {
        Self {
            digits: 10,
            leading_digits: (1..=5).collect(),
        }
    }
}

fn integral_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(?:\.0*)?$").expect("static regex"))
}

/// Reduces raw identifier text to its digit string.
///
/// Accepts float renderings of integers ("1013540001.0") produced by
/// spreadsheet exports, and left-pads short values with zeros to `width`.
fn digits_of(raw: &str, width: usize) -> Result<String, DegradeReason> {
    let caps = integral_re().captures(raw.trim()).ok_or(DegradeReason::Malformed)?;
    let digits = &caps[1];
    if digits.len() > width {
        return Err(DegradeReason::Malformed);
    }
    Ok(format!("{digits:0>width$}"))
}

fn leading_digit(s: &str) -> u8 {
    s.as_bytes().first().map_or(0, |b| b - b'0')
}

/// A validated parcel identifier.
///
/// # Examples
///
/// ```
/// use building_registry::{ParcelFormat, ParcelId};
///
/// let format = ParcelFormat::default();
/// let id = ParcelId::parse("1000010001", &format, &[]).unwrap();
/// assert_eq!(id.as_str(), "1000010001");
/// assert!(ParcelId::parse("6000010001", &format, &[]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParcelId(String);

impl ParcelId {
    /// Parses and bound-checks a raw parcel identifier.
    ///
    /// # Errors
    ///
    /// Returns the reason the value must be treated as absent.
    pub fn parse(raw: &str, format: &ParcelFormat, placeholders: &[String]) -> Result<Self, DegradeReason> {
        let digits = digits_of(raw, format.digits)?;
        if !format.leading_digits.contains(&leading_digit(&digits)) {
            return Err(DegradeReason::OutOfRange);
        }
        if placeholders.iter().any(|p| p == &digits) {
            return Err(DegradeReason::Placeholder);
        }
        Ok(Self(digits))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Region named by the leading digit.
    #[must_use]
    pub fn region(&self) -> Option<Region> {
        Region::from_digit(leading_digit(&self.0))
    }
}

impl fmt::Display for ParcelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated building identification number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bin(String);

impl Bin {
    /// Parses a raw BIN; the leading digit must be a region code.
    ///
    /// # Errors
    ///
    /// Returns the reason the value must be treated as absent.
    pub fn parse(raw: &str, placeholders: &[String]) -> Result<Self, DegradeReason> {
        let digits = digits_of(raw, BIN_DIGITS)?;
        if Region::from_digit(leading_digit(&digits)).is_none() {
            return Err(DegradeReason::OutOfRange);
        }
        if placeholders.iter().any(|p| p == &digits) {
            return Err(DegradeReason::Placeholder);
        }
        Ok(Self(digits))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
