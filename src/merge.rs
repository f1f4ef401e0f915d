//! Canonical record synthesis.
//!
//! For each attribute the value comes from the highest-ranked cluster member
//! that has it present. Rank is source priority, then completeness, then the
//! record identity order; the last step makes the choice total.

use std::cmp::Reverse;

use uuid::Uuid;

use crate::cluster::BuildingCluster;
use crate::error::MergeError;
use crate::provenance::Provenance;
use crate::record::{Attribute, SourceRecord};
use crate::registry::CanonicalRecord;
use crate::source::SourceRecordId;

/// Namespace for canonical ids.
pub const CANONICAL_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93d8_4b57_a0e2_5c3b_7d19_e846);

/// Deterministic id for a cluster membership.
///
/// Input order does not matter; the ids are sorted before hashing. Each
/// field is length-prefixed, so ids containing separators cannot collide.
///
/// # Examples
///
/// ```
/// use building_registry::merge::canonical_id;
/// use building_registry::{SourceName, SourceRecordId};
///
/// let a = SourceRecordId::new(SourceName::new("curated"), "LP-1");
/// let b = SourceRecordId::new(SourceName::new("addition"), "7");
/// assert_eq!(canonical_id(&[a.clone(), b.clone()]), canonical_id(&[b, a]));
/// ```
#[must_use]
pub fn canonical_id(members: &[SourceRecordId]) -> Uuid {
    let mut sorted: Vec<&SourceRecordId> = members.iter().collect();
    sorted.sort();
    let mut key = Vec::new();
    for id in sorted {
        for field in [id.source_name.as_str(), id.source_id.as_str()] {
            key.extend_from_slice(&(field.len() as u64).to_le_bytes());
            key.extend_from_slice(field.as_bytes());
        }
    }
    Uuid::new_v5(&CANONICAL_NAMESPACE, &key)
}

/// Merge rank; smaller sorts first.
fn rank_key(record: &SourceRecord) -> (Reverse<i32>, Reverse<usize>, &SourceRecordId) {
    (Reverse(record.source_priority), Reverse(record.completeness()), &record.id)
}

/// Picks the first ranked member with a present value and records it.
fn pick<T: Clone>(
    ranked: &[&SourceRecord],
    attribute: Attribute,
    provenance: &mut Provenance,
    get: impl Fn(&SourceRecord) -> Option<&T>,
) -> Option<T> {
    ranked.iter().copied().find_map(|r| get(r).map(|v| (r, v))).map(|(r, v)| {
        provenance.record(attribute, r.id.clone());
        v.clone()
    })
}

/// Synthesizes the canonical record for one cluster.
///
/// # Errors
///
/// - `MergeError::EmptyCluster` if the cluster has no members
/// - `MergeError::DanglingMember` if a member index is out of range
/// - `MergeError::AmbiguousMerge` if two members share an identity
pub fn merge_cluster(cluster: &BuildingCluster, records: &[SourceRecord]) -> Result<CanonicalRecord, MergeError> {
    if cluster.members.is_empty() {
        return Err(MergeError::EmptyCluster);
    }
    let mut ranked = Vec::with_capacity(cluster.members.len());
    for &index in &cluster.members {
        let record = records.get(index).ok_or(MergeError::DanglingMember {
            index,
            len: records.len(),
        })?;
        ranked.push(record);
    }

    let mut member_source_ids: Vec<SourceRecordId> = ranked.iter().map(|r| r.id.clone()).collect();
    member_source_ids.sort();
    if let Some(dup) = member_source_ids.windows(2).find(|w| w[0] == w[1]) {
        return Err(MergeError::ambiguous(&dup[0]));
    }

    ranked.sort_by(|a, b| rank_key(a).cmp(&rank_key(b)));

    let mut provenance = Provenance::new();
    let p = &mut provenance;
    let parcel_id = pick(&ranked, Attribute::ParcelId, p, |r| r.parcel_id.as_ref());
    let bin = pick(&ranked, Attribute::Bin, p, |r| r.bin.as_ref());
    let location = pick(&ranked, Attribute::Location, p, |r| r.location.as_ref());
    let year_built = pick(&ranked, Attribute::YearBuilt, p, |r| r.year_built.as_ref());
    let name = pick(&ranked, Attribute::Name, p, |r| r.name.as_ref());
    let address = pick(&ranked, Attribute::Address, p, |r| r.address.as_ref());
    let architect = pick(&ranked, Attribute::Architect, p, |r| r.architect.as_ref());
    let style = pick(&ranked, Attribute::Style, p, |r| r.style.as_ref());
    let height = pick(&ranked, Attribute::Height, p, |r| r.height.as_ref());
    let floor_count = pick(&ranked, Attribute::FloorCount, p, |r| r.floor_count.as_ref());

    Ok(CanonicalRecord {
        canonical_id: canonical_id(&member_source_ids),
        parcel_id,
        bin,
        location,
        year_built,
        name,
        address,
        architect,
        style,
        height,
        floor_count,
        provenance,
        member_source_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::parcel::{ParcelFormat, ParcelId};
    use crate::scorer::{MatchEdge, MatchRule};
    use crate::source::SourceName;

    fn rec(source: &str, id: &str, priority: i32) -> SourceRecord {
        SourceRecord::new(SourceRecordId::new(SourceName::new(source), id), priority)
    }

    fn cluster(members: Vec<usize>) -> BuildingCluster {
        let edges = members.windows(2).map(|w| MatchEdge::new(w[0], w[1], MatchRule::Spatial)).collect();
        BuildingCluster { members, edges }
    }

    #[test]
    fn test_singleton_copies_verbatim() {
        let records = vec![rec("curated", "LP-1", 30)
            .with_name("Flatiron Building")
            .with_year_built(1902)
            .with_location(GeoPoint::new(40.7411, -73.9897).unwrap())];
        let merged = merge_cluster(&cluster(vec![0]), &records).unwrap();
        assert_eq!(merged.name.as_deref(), Some("Flatiron Building"));
        assert_eq!(merged.year_built, Some(1902));
        assert_eq!(merged.location, records[0].location);
        assert_eq!(merged.address, None);
        assert_eq!(merged.provenance.len(), 3);
        assert!(merged.provenance.iter().all(|(_, id)| *id == records[0].id));
        assert_eq!(merged.member_source_ids, vec![records[0].id.clone()]);
    }

    #[test]
    fn test_priority_wins_then_gaps_filled() {
        let records = vec![
            rec("addition", "7", 20).with_name("Woolworth Bldg").with_architect("Cass Gilbert").with_height(792.0),
            rec("curated", "LP-1", 30).with_name("Woolworth Building"),
        ];
        let merged = merge_cluster(&cluster(vec![0, 1]), &records).unwrap();
        assert_eq!(merged.name.as_deref(), Some("Woolworth Building"));
        assert_eq!(merged.architect.as_deref(), Some("Cass Gilbert"));
        assert_eq!(merged.provenance.source_of(Attribute::Name).map(SourceName::as_str), Some("curated"));
        assert_eq!(merged.provenance.source_of(Attribute::Height).map(SourceName::as_str), Some("addition"));
    }

    #[test]
    fn test_completeness_breaks_priority_tie() {
        let records = vec![
            rec("curated", "A", 30).with_name("Short"),
            rec("curated", "B", 30).with_name("Fuller").with_style("Beaux-Arts"),
        ];
        let merged = merge_cluster(&cluster(vec![0, 1]), &records).unwrap();
        assert_eq!(merged.name.as_deref(), Some("Fuller"));
    }

    #[test]
    fn test_identity_breaks_full_tie() {
        let records = vec![
            rec("curated", "B", 30).with_name("Second"),
            rec("curated", "A", 30).with_name("First"),
        ];
        let merged = merge_cluster(&cluster(vec![0, 1]), &records).unwrap();
        assert_eq!(merged.name.as_deref(), Some("First"));
        assert_eq!(merged.member_source_ids[0].source_id, "A");
    }

    #[test]
    fn test_canonical_id_independent_of_member_order() {
        let records = vec![rec("curated", "A", 30), rec("addition", "9", 20)];
        let swapped = vec![records[1].clone(), records[0].clone()];
        let a = merge_cluster(&cluster(vec![0, 1]), &records).unwrap();
        let b = merge_cluster(&cluster(vec![0, 1]), &swapped).unwrap();
        assert_eq!(a.canonical_id, b.canonical_id);
        assert_eq!(a.canonical_id.get_version_num(), 5);
    }

    #[test]
    fn test_canonical_id_depends_on_membership() {
        let a = SourceRecordId::new(SourceName::new("curated"), "A");
        let b = SourceRecordId::new(SourceName::new("curated"), "B");
        assert_ne!(canonical_id(&[a.clone()]), canonical_id(&[a, b]));
    }

    #[test]
    fn test_canonical_id_unambiguous_for_ids_with_separators() {
        let a = SourceRecordId::new(SourceName::new("curated"), "a");
        let b = SourceRecordId::new(SourceName::new("curated"), "b");
        let joined = SourceRecordId::new(SourceName::new("curated"), "a\ncurated:b");
        assert_ne!(canonical_id(&[a, b]), canonical_id(&[joined]));

        let split = SourceRecordId::new(SourceName::new("x:y"), "z");
        let shifted = SourceRecordId::new(SourceName::new("x"), "y:z");
        assert_ne!(canonical_id(&[split]), canonical_id(&[shifted]));
    }

    #[test]
    fn test_duplicate_identity_is_ambiguous() {
        let records = vec![rec("curated", "A", 30).with_name("x"), rec("curated", "A", 30).with_name("y")];
        let err = merge_cluster(&cluster(vec![0, 1]), &records).unwrap_err();
        assert_eq!(
            err,
            MergeError::AmbiguousMerge {
                source_name: "curated".to_string(),
                source_id: "A".to_string()
            }
        );
    }

    #[test]
    fn test_empty_and_dangling_clusters() {
        let records = vec![rec("curated", "A", 30)];
        assert_eq!(merge_cluster(&cluster(vec![]), &records), Err(MergeError::EmptyCluster));
        assert_eq!(
            merge_cluster(&cluster(vec![0, 3]), &records),
            Err(MergeError::DanglingMember { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_parcel_id_provenance() {
        let parcel = ParcelId::parse("1000010001", &ParcelFormat::default(), &[]).unwrap();
        let records = vec![
            rec("curated", "A", 30).with_name("Alpha"),
            rec("addition", "B", 20).with_parcel_id(parcel.clone()),
        ];
        let merged = merge_cluster(&cluster(vec![0, 1]), &records).unwrap();
        assert_eq!(merged.parcel_id, Some(parcel));
        assert_eq!(merged.provenance.winner(Attribute::ParcelId), Some(&records[1].id));
    }
}
