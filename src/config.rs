//! Registry configuration.
//!
//! Every option has a default matching the New York City landmark feeds,
//! so an empty JSON object is a valid configuration.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geo::GeoBounds;
use crate::parcel::ParcelFormat;
use crate::source::SourceName;

/// Years past the current one still accepted as a construction year.
const FUTURE_YEAR_SLACK: i32 = 5;

/// Inclusive range of plausible construction years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct YearRange {
    /// Earliest accepted year.
    pub min: i32,
    /// Latest accepted year.
    pub max: i32,
}

impl YearRange {
    /// Returns true if the year lies in the range.
    #[must_use]
    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            min: 1600,
            max: Utc::now().year() + FUTURE_YEAR_SLACK,
        }
    }
}

/// Pairwise match thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// Maximum great-circle distance for a spatial match, in meters.
    pub distance_m: f64,
    /// Maximum construction-year difference for a spatial match.
    pub year_tolerance: u32,
    /// Minimum normalized text similarity for a degraded-mode match.
    pub similarity: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            distance_m: 20.0,
            year_tolerance: 2,
            similarity: 0.85,
        }
    }
}

/// Per-source priority ranks. Higher wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePriorities(BTreeMap<SourceName, i32>);

impl SourcePriorities {
    /// Creates an empty table; every source ranks 0.
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets the rank for a source.
    #[must_use]
    pub fn with(mut self, source: impl Into<SourceName>, rank: i32) -> Self {
        self.0.insert(source.into(), rank);
        self
    }

    /// Rank for a source; unknown sources rank 0.
    #[must_use]
    pub fn rank(&self, source: &SourceName) -> i32 {
        self.0.get(source).copied().unwrap_or(0)
    }
}

impl Default for SourcePriorities {
    fn default() -> Self {
        Self::empty()
            .with("manual", 100)
            .with("curated", 30)
            .with("addition", 20)
            .with("gap-fill", 10)
    }
}

/// Complete configuration for one registry run.
///
/// # Examples
///
/// ```
/// use building_registry::RegistryConfig;
///
/// let config = RegistryConfig::from_json_str(r#"{ "thresholds": { "distance_m": 25.0 } }"#).unwrap();
/// assert_eq!(config.thresholds.distance_m, 25.0);
/// assert_eq!(config.thresholds.year_tolerance, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Envelope that valid locations must fall within.
    pub bounds: GeoBounds,
    /// Pairwise match thresholds.
    pub thresholds: MatchThresholds,
    /// Source ranks used by the merger.
    pub priorities: SourcePriorities,
    /// Accepted parcel identifier shape.
    pub parcel_format: ParcelFormat,
    /// Plausible construction years.
    pub year_range: YearRange,
    /// Edge of a spatial blocking cell, in meters.
    pub grid_cell_m: f64,
    /// Parcel identifiers known to be in-band stand-ins for "missing".
    pub placeholder_parcel_ids: Vec<String>,
    /// BINs known to be in-band stand-ins for "missing".
    pub placeholder_bins: Vec<String>,
    /// Text values treated as absent (compared case-insensitively).
    pub placeholder_text: Vec<String>,
    /// Scoring worker threads.
    pub workers: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bounds: GeoBounds::default(),
            thresholds: MatchThresholds::default(),
            priorities: SourcePriorities::default(),
            parcel_format: ParcelFormat::default(),
            year_range: YearRange::default(),
            grid_cell_m: 200.0,
            placeholder_parcel_ids: vec!["5079660001".to_string()],
            placeholder_bins: vec!["5088547".to_string()],
            placeholder_text: ["0", "nan", "null", "none", "n/a"].iter().map(ToString::to_string).collect(),
            workers: 4,
        }
    }
}

impl RegistryConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the JSON is unreadable or the values are inconsistent.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Unreadable {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    /// Checks that the options are mutually consistent.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.bounds;
        let coords = [b.min_lat, b.max_lat, b.min_lng, b.max_lng];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::InvalidBounds {
                reason: "coordinates must be finite".to_string(),
            });
        }
        if b.min_lat >= b.max_lat || b.min_lng >= b.max_lng {
            return Err(ConfigError::InvalidBounds {
                reason: "min must be below max on both axes".to_string(),
            });
        }
        if b.min_lat < -90.0 || b.max_lat > 90.0 || b.min_lng < -180.0 || b.max_lng > 180.0 {
            return Err(ConfigError::InvalidBounds {
                reason: "envelope exceeds the globe".to_string(),
            });
        }

        let t = &self.thresholds;
        if !(t.distance_m.is_finite() && t.distance_m > 0.0) {
            return Err(threshold("distance_m", t.distance_m, "must be positive"));
        }
        if !(t.similarity > 0.0 && t.similarity <= 1.0) {
            return Err(threshold("similarity", t.similarity, "must be in (0, 1]"));
        }
        if !(self.grid_cell_m.is_finite() && self.grid_cell_m >= t.distance_m) {
            return Err(threshold(
                "grid_cell_m",
                self.grid_cell_m,
                "must be at least the match distance",
            ));
        }

        if self.year_range.min > self.year_range.max {
            return Err(ConfigError::InvalidYearRange {
                min: self.year_range.min,
                max: self.year_range.max,
            });
        }

        let p = &self.parcel_format;
        if p.digits == 0 {
            return Err(ConfigError::InvalidParcelFormat {
                reason: "digit count must be positive".to_string(),
            });
        }
        if p.leading_digits.is_empty() || p.leading_digits.iter().any(|d| *d > 9) {
            return Err(ConfigError::InvalidParcelFormat {
                reason: "leading digits must be a non-empty set of 0-9".to_string(),
            });
        }

        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }

    /// Returns true if a trimmed text value is a configured placeholder.
    #[must_use]
    pub fn is_placeholder_text(&self, value: &str) -> bool {
        self.placeholder_text.iter().any(|p| p.eq_ignore_ascii_case(value))
    }
}

fn threshold(name: &str, value: f64, reason: &str) -> ConfigError {
    ConfigError::InvalidThreshold {
        name: name.to_string(),
        value,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RegistryConfig::default();
        config.validate().unwrap();
        assert_eq!(config.thresholds.distance_m, 20.0);
        assert!(config.year_range.contains(1902));
        assert!(!config.year_range.contains(9999));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = RegistryConfig::from_json_str("{}").unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.priorities.rank(&SourceName::new("curated")), 30);
        assert_eq!(config.priorities.rank(&SourceName::new("unheard-of")), 0);
    }

    #[test]
    fn test_partial_nested_overrides_keep_remaining_defaults() {
        let config = RegistryConfig::from_json_str(r#"{ "year_range": { "min": 1800 }, "bounds": { "max_lat": 41.2 } }"#)
            .unwrap();
        let defaults = RegistryConfig::default();
        assert_eq!(config.year_range.min, 1800);
        assert_eq!(config.year_range.max, defaults.year_range.max);
        assert!((config.bounds.max_lat - 41.2).abs() < 1e-12);
        assert!((config.bounds.min_lat - defaults.bounds.min_lat).abs() < 1e-12);
        assert!((config.bounds.max_lng - defaults.bounds.max_lng).abs() < 1e-12);
        config.validate().unwrap();
    }

    #[test]
    fn test_priorities_from_json() {
        let config = RegistryConfig::from_json_str(r#"{ "priorities": { "Addition": 50, "curated": 10 } }"#).unwrap();
        assert_eq!(config.priorities.rank(&SourceName::new("addition")), 50);
        assert_eq!(config.priorities.rank(&SourceName::new("manual")), 0);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = RegistryConfig::default();
        config.bounds.min_lat = 41.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBounds { .. })));
    }

    #[test]
    fn test_grid_smaller_than_distance_rejected() {
        let mut config = RegistryConfig::default();
        config.grid_cell_m = 10.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("grid_cell_m"));
    }

    #[test]
    fn test_similarity_out_of_range_rejected() {
        let mut config = RegistryConfig::default();
        config.thresholds.similarity = 1.5;
        assert!(config.validate().is_err());
        config.thresholds.similarity = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_year_range_and_workers() {
        let mut config = RegistryConfig::default();
        config.year_range = YearRange { min: 2000, max: 1900 };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidYearRange { .. })));

        let mut config = RegistryConfig::default();
        config.workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn test_parcel_format_validation() {
        let mut config = RegistryConfig::default();
        config.parcel_format.leading_digits.clear();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidParcelFormat { .. })));
    }

    #[test]
    fn test_unreadable_json() {
        let err = RegistryConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{ "workers": 2, "grid_cell_m": 250.0 }}"#).unwrap();

        let config = RegistryConfig::from_path(&path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.grid_cell_m, 250.0);

        let missing = RegistryConfig::from_path(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Unreadable { .. })));
    }

    #[test]
    fn test_placeholder_text_case_insensitive() {
        let config = RegistryConfig::default();
        assert!(config.is_placeholder_text("N/A"));
        assert!(config.is_placeholder_text("0"));
        assert!(!config.is_placeholder_text("Flatiron Building"));
    }
}
