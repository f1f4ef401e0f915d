//! Source and provenance identity.
//!
//! Every building observation comes from a named source. The pair of source
//! name and per-source identifier is the record's global identity, and its
//! ordering is the final tie-break everywhere a deterministic choice is needed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provenance tag of a record set ("curated", "addition", "gap-fill", ...).
///
/// Names are trimmed and lowercased so that differently-cased configuration
/// and input refer to the same source.
///
/// # Examples
///
/// ```
/// use building_registry::SourceName;
///
/// assert_eq!(SourceName::new("  Curated "), SourceName::new("curated"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourceName(String);

impl SourceName {
    /// Creates a normalized source name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SourceName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<SourceName> for String {
    fn from(name: SourceName) -> Self {
        name.0
    }
}

/// Global identity of one source record.
///
/// Ordering is lexicographic on `source_name` then `source_id`, compared
/// byte-wise. This is the total order used for canonical id derivation and
/// for the last merge tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRecordId {
    /// Originating source.
    pub source_name: SourceName,
    /// Identifier within that source, opaque.
    pub source_id: String,
}

impl SourceRecordId {
    /// Creates a record identity.
    #[must_use]
    pub fn new(source_name: SourceName, source_id: impl Into<String>) -> Self {
        Self {
            source_name,
            source_id: source_id.into(),
        }
    }
}

impl fmt::Display for SourceRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_name, self.source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name_normalized() {
        let name = SourceName::new(" Gap-Fill ");
        assert_eq!(name.as_str(), "gap-fill");
        assert_eq!(format!("{name}"), "gap-fill");
    }

    #[test]
    fn test_source_name_deserialize_normalizes() {
        let name: SourceName = serde_json::from_str(r#"" Curated""#).unwrap();
        assert_eq!(name, SourceName::new("curated"));
    }

    #[test]
    fn test_record_id_display() {
        let id = SourceRecordId::new(SourceName::new("curated"), "LP-00001");
        assert_eq!(format!("{id}"), "curated:LP-00001");
    }

    #[test]
    fn test_record_id_order_is_name_then_id() {
        let a = SourceRecordId::new(SourceName::new("addition"), "9");
        let b = SourceRecordId::new(SourceName::new("curated"), "1");
        let c = SourceRecordId::new(SourceName::new("curated"), "10");
        let d = SourceRecordId::new(SourceName::new("curated"), "2");

        let mut ids = vec![d.clone(), c.clone(), b.clone(), a.clone()];
        ids.sort();
        // Byte-wise: "10" sorts before "2".
        assert_eq!(ids, vec![a, b, c, d]);
    }

    #[test]
    fn test_record_id_serialization() {
        let id = SourceRecordId::new(SourceName::new("addition"), "NA-17");
        let json = serde_json::to_string(&id).unwrap();
        let back: SourceRecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
