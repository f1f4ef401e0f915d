//! Normalized building observations.
//!
//! A [`SourceRecord`] is immutable once normalized. Every optional attribute
//! is an `Option`; absence is never encoded as an in-band value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::parcel::{Bin, ParcelId};
use crate::source::{SourceName, SourceRecordId};

/// Mergeable attributes of a building.
///
/// Each variant names the `SourceRecord` field of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Attribute {
    ParcelId,
    Bin,
    Location,
    YearBuilt,
    Name,
    Address,
    Architect,
    Style,
    Height,
    FloorCount,
}

impl Attribute {
    /// Every attribute, in output column order.
    pub const ALL: [Self; 10] = [
        Self::ParcelId,
        Self::Bin,
        Self::Location,
        Self::YearBuilt,
        Self::Name,
        Self::Address,
        Self::Architect,
        Self::Style,
        Self::Height,
        Self::FloorCount,
    ];

    /// Column name of the attribute.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ParcelId => "parcel_id",
            Self::Bin => "bin",
            Self::Location => "location",
            Self::YearBuilt => "year_built",
            Self::Name => "name",
            Self::Address => "address",
            Self::Architect => "architect",
            Self::Style => "style",
            Self::Height => "height",
            Self::FloorCount => "floor_count",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One building observation from one source, ready for matching.
///
/// # Examples
///
/// ```
/// use building_registry::{SourceName, SourceRecord, SourceRecordId};
///
/// let record = SourceRecord::new(SourceRecordId::new(SourceName::new("curated"), "LP-1"), 30)
///     .with_name("Flatiron Building")
///     .with_year_built(1902);
/// assert_eq!(record.completeness(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source and per-source identifier.
    pub id: SourceRecordId,

    /// Rank of the record's source; higher wins merges.
    pub source_priority: i32,

    /// Tax-lot identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parcel_id: Option<ParcelId>,

    /// Building identification number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<Bin>,

    /// Point inside the configured envelope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,

    /// Construction year within the configured range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i32>,

    /// Building name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Architect or firm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architect: Option<String>,

    /// Architectural style.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Height in feet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    /// Number of floors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_count: Option<u32>,
}

impl SourceRecord {
    /// Creates a record with every attribute absent.
    #[must_use]
    pub fn new(id: SourceRecordId, source_priority: i32) -> Self {
        Self {
            id,
            source_priority,
            parcel_id: None,
            bin: None,
            location: None,
            year_built: None,
            name: None,
            address: None,
            architect: None,
            style: None,
            height: None,
            floor_count: None,
        }
    }

    /// Source that produced the record.
    #[must_use]
    pub fn source_name(&self) -> &SourceName {
        &self.id.source_name
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn has(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::ParcelId => self.parcel_id.is_some(),
            Attribute::Bin => self.bin.is_some(),
            Attribute::Location => self.location.is_some(),
            Attribute::YearBuilt => self.year_built.is_some(),
            Attribute::Name => self.name.is_some(),
            Attribute::Address => self.address.is_some(),
            Attribute::Architect => self.architect.is_some(),
            Attribute::Style => self.style.is_some(),
            Attribute::Height => self.height.is_some(),
            Attribute::FloorCount => self.floor_count.is_some(),
        }
    }

    /// Number of present optional attributes. A merge tie-break signal.
    #[must_use]
    pub fn completeness(&self) -> usize {
        Attribute::ALL.iter().filter(|a| self.has(**a)).count()
    }

    /// Returns true if neither a parcel id nor a location is present.
    #[must_use]
    pub fn lacks_strong_identity(&self) -> bool {
        self.parcel_id.is_none() && self.location.is_none()
    }

    /// Sets the parcel id.
    #[must_use]
    pub fn with_parcel_id(mut self, parcel_id: ParcelId) -> Self {
        self.parcel_id = Some(parcel_id);
        self
    }

    /// Sets the BIN.
    #[must_use]
    pub fn with_bin(mut self, bin: Bin) -> Self {
        self.bin = Some(bin);
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the construction year.
    #[must_use]
    pub fn with_year_built(mut self, year: i32) -> Self {
        self.year_built = Some(year);
        self
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the street address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the architect.
    #[must_use]
    pub fn with_architect(mut self, architect: impl Into<String>) -> Self {
        self.architect = Some(architect.into());
        self
    }

    /// Sets the architectural style.
    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Sets the height in feet.
    #[must_use]
    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    /// Sets the floor count.
    #[must_use]
    pub fn with_floor_count(mut self, floors: u32) -> Self {
        self.floor_count = Some(floors);
        self
    }
}
