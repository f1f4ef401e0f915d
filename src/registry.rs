//! The canonical registry: one merged record per building.
//!
//! A registry is an immutable value produced wholesale by a run. Downstream
//! consumers read it through [`CanonicalRegistry::rows`] or walk the records
//! directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::geo::GeoPoint;
use crate::parcel::{Bin, ParcelId, Region};
use crate::provenance::Provenance;
use crate::record::Attribute;
use crate::source::SourceRecordId;

/// Merged representation of one building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Derived from the sorted member identifiers; stable across runs.
    pub canonical_id: Uuid,
    /// Merged tax-lot identifier.
    pub parcel_id: Option<ParcelId>,
    /// Merged building identification number.
    pub bin: Option<Bin>,
    /// Merged location.
    pub location: Option<GeoPoint>,
    /// Merged construction year.
    pub year_built: Option<i32>,
    /// Merged name.
    pub name: Option<String>,
    /// Merged street address.
    pub address: Option<String>,
    /// Merged architect.
    pub architect: Option<String>,
    /// Merged style.
    pub style: Option<String>,
    /// Merged height in feet.
    pub height: Option<f64>,
    /// Merged floor count.
    pub floor_count: Option<u32>,
    /// Winning record per populated attribute.
    pub provenance: Provenance,
    /// Contributing records, sorted.
    pub member_source_ids: Vec<SourceRecordId>,
}

impl CanonicalRecord {
    /// Region implied by the merged parcel id.
    #[must_use]
    pub fn region(&self) -> Option<Region> {
        self.parcel_id.as_ref().and_then(ParcelId::region)
    }

    /// Returns true if the merged attribute is present.
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

    /// Number of contributing source records.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.member_source_ids.len()
    }
}

/// Flat export row for one canonical record.
///
/// Columns are the canonical id, the merged attributes, one `<attribute>_source`
/// column naming the winning source, and the `;`-joined member identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct RegistryRow {
    pub canonical_id: String,
    pub parcel_id: Option<String>,
    pub bin: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub year_built: Option<i32>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub architect: Option<String>,
    pub style: Option<String>,
    pub height: Option<f64>,
    pub floor_count: Option<u32>,
    pub region: Option<Region>,
    pub parcel_id_source: Option<String>,
    pub bin_source: Option<String>,
    pub location_source: Option<String>,
    pub year_built_source: Option<String>,
    pub name_source: Option<String>,
    pub address_source: Option<String>,
    pub architect_source: Option<String>,
    pub style_source: Option<String>,
    pub height_source: Option<String>,
    pub floor_count_source: Option<String>,
    pub member_source_ids: String,
}

impl From<&CanonicalRecord> for RegistryRow {
    fn from(record: &CanonicalRecord) -> Self {
        let source = |attr| record.provenance.source_of(attr).map(ToString::to_string);
        Self {
            canonical_id: record.canonical_id.to_string(),
            parcel_id: record.parcel_id.as_ref().map(ToString::to_string),
            bin: record.bin.as_ref().map(ToString::to_string),
            latitude: record.location.map(|p| p.lat()),
            longitude: record.location.map(|p| p.lng()),
            year_built: record.year_built,
            name: record.name.clone(),
            address: record.address.clone(),
            architect: record.architect.clone(),
            style: record.style.clone(),
            height: record.height,
            floor_count: record.floor_count,
            region: record.region(),
            parcel_id_source: source(Attribute::ParcelId),
            bin_source: source(Attribute::Bin),
            location_source: source(Attribute::Location),
            year_built_source: source(Attribute::YearBuilt),
            name_source: source(Attribute::Name),
            address_source: source(Attribute::Address),
            architect_source: source(Attribute::Architect),
            style_source: source(Attribute::Style),
            height_source: source(Attribute::Height),
            floor_count_source: source(Attribute::FloorCount),
            member_source_ids: record
                .member_source_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

/// Population of one attribute across the registry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttributeCoverage {
    /// Records with the attribute present.
    pub populated: usize,
    /// Share of records with the attribute, 0 to 100.
    pub percent: f64,
}

/// Per-attribute coverage of a registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessReport {
    /// Canonical records counted.
    pub total: usize,
    /// Coverage for every attribute, including empty ones.
    pub attributes: BTreeMap<Attribute, AttributeCoverage>,
}

impl CompletenessReport {
    /// Coverage of one attribute.
    #[must_use]
    pub fn coverage(&self, attribute: Attribute) -> AttributeCoverage {
        self.attributes.get(&attribute).copied().unwrap_or(AttributeCoverage {
            populated: 0,
            percent: 0.0,
        })
    }
}

/// Canonical records ordered by canonical id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRegistry {
    records: Vec<CanonicalRecord>,
}

impl CanonicalRegistry {
    /// Builds a registry, ordering the records by canonical id.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Internal` if two records share a canonical id,
    /// or a source record contributes to more than one canonical record.
    pub fn new(mut records: Vec<CanonicalRecord>) -> RegistryResult<Self> {
        records.sort_by_key(|r| r.canonical_id);
        if let Some(pair) = records.windows(2).find(|w| w[0].canonical_id == w[1].canonical_id) {
            return Err(RegistryError::internal(format!(
                "canonical id {} produced twice",
                pair[0].canonical_id
            )));
        }
        let mut seen: BTreeMap<&SourceRecordId, Uuid> = BTreeMap::new();
        for record in &records {
            for id in &record.member_source_ids {
                if let Some(other) = seen.insert(id, record.canonical_id) {
                    return Err(RegistryError::internal(format!(
                        "{id} belongs to both {other} and {}",
                        record.canonical_id
                    )));
                }
            }
        }
        Ok(Self { records })
    }

    /// Records in canonical id order.
    #[must_use]
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Number of canonical records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record by canonical id.
    #[must_use]
    pub fn get(&self, canonical_id: &Uuid) -> Option<&CanonicalRecord> {
        self.records
            .binary_search_by_key(canonical_id, |r| r.canonical_id)
            .ok()
            .map(|i| &self.records[i])
    }

    /// The canonical record a source record was merged into.
    #[must_use]
    pub fn find_member(&self, id: &SourceRecordId) -> Option<&CanonicalRecord> {
        self.records.iter().find(|r| r.member_source_ids.binary_search(id).is_ok())
    }

    /// Flat export rows, one per record, in canonical id order.
    #[must_use]
    pub fn rows(&self) -> Vec<RegistryRow> {
        self.records.iter().map(RegistryRow::from).collect()
    }

    /// Digest of the exported rows. Equal registries have equal fingerprints.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Internal` if the rows cannot be serialized.
    pub fn fingerprint(&self) -> RegistryResult<String> {
        let bytes = serde_json::to_vec(&self.rows())
            .map_err(|e| RegistryError::internal(format!("failed to serialize rows: {e}")))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Per-attribute population counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completeness(&self) -> CompletenessReport {
        let total = self.records.len();
        let attributes = Attribute::ALL
            .iter()
            .map(|attr| {
                let populated = self.records.iter().filter(|r| r.has(*attr)).count();
                let percent = if total == 0 {
                    0.0
                } else {
                    populated as f64 * 100.0 / total as f64
                };
                (*attr, AttributeCoverage { populated, percent })
            })
            .collect();
        CompletenessReport { total, attributes }
    }
}
