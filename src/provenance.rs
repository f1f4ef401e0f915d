//! Field-level lineage of canonical records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::Attribute;
use crate::source::{SourceName, SourceRecordId};

/// Which source record supplied each merged attribute.
///
/// Attributes absent from every cluster member have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provenance {
    fields: BTreeMap<Attribute, SourceRecordId>,
}

impl Provenance {
    /// Creates an empty provenance map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the winner for an attribute, replacing any earlier one.
    pub fn record(&mut self, attribute: Attribute, winner: SourceRecordId) {
        self.fields.insert(attribute, winner);
    }

    /// The record that supplied an attribute.
    #[must_use]
    pub fn winner(&self, attribute: Attribute) -> Option<&SourceRecordId> {
        self.fields.get(&attribute)
    }

    /// The source that supplied an attribute.
    #[must_use]
    pub fn source_of(&self, attribute: Attribute) -> Option<&SourceName> {
        self.winner(attribute).map(|id| &id.source_name)
    }

    /// Attributes won by the given source, in column order.
    #[must_use]
    pub fn attributes_from(&self, source: &SourceName) -> Vec<Attribute> {
        self.fields
            .iter()
            .filter(|(_, id)| &id.source_name == source)
            .map(|(attr, _)| *attr)
            .collect()
    }

    /// Iterates over `(attribute, winner)` in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &SourceRecordId)> {
        self.fields.iter().map(|(a, id)| (*a, id))
    }

    /// Number of attributes with a recorded winner.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no attribute has a winner.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
