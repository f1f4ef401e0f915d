use std::collections::{BTreeMap, BTreeSet};

use building_registry::{build_registry, GeoPoint, RecordSet, RegistryConfig, SourceName, SourceRecordId};
use proptest::prelude::*;
use serde_json::{json, Value};

const PARCELS: [&str; 3] = ["1000010001", "1000010002", "2000020001"];
const NAMES: [&str; 3] = ["Old Mill", "Old Mill House", "Harbor Depot"];

#[derive(Debug, Clone)]
struct RawRow {
    parcel: Option<usize>,
    cell: Option<(u8, u8)>,
    year: Option<i32>,
    name: Option<usize>,
}

fn raw_row() -> impl Strategy<Value = RawRow> {
    (
        proptest::option::of(0..PARCELS.len()),
        proptest::option::of((0u8..6, 0u8..6)),
        proptest::option::of(1900i32..1906),
        proptest::option::of(0..NAMES.len()),
    )
        .prop_map(|(parcel, cell, year, name)| RawRow { parcel, cell, year, name })
}

fn to_json(id: usize, row: &RawRow) -> Value {
    let mut v = json!({ "source_id": id.to_string() });
    if let Some(p) = row.parcel {
        v["bbl"] = json!(PARCELS[p]);
    }
    if let Some((dy, dx)) = row.cell {
        let base = GeoPoint::new(40.70, -73.95).unwrap();
        let p = base.offset_m(f64::from(dy) * 8.0, f64::from(dx) * 8.0);
        v["latitude"] = json!(p.lat());
        v["longitude"] = json!(p.lng());
    }
    if let Some(y) = row.year {
        v["year_built"] = json!(y);
    }
    if let Some(n) = row.name {
        v["name"] = json!(NAMES[n]);
    }
    v
}

fn record_sets(curated: &[RawRow], addition: &[RawRow]) -> Vec<RecordSet> {
    vec![
        RecordSet::new("curated", curated.iter().enumerate().map(|(i, r)| to_json(i, r)).collect()),
        RecordSet::new("addition", addition.iter().enumerate().map(|(i, r)| to_json(i, r)).collect()),
    ]
}

fn parcel_of(curated: &[RawRow], addition: &[RawRow], id: &SourceRecordId) -> Option<usize> {
    let idx: usize = id.source_id.parse().unwrap();
    match id.source_name.as_str() {
        "curated" => curated[idx].parcel,
        _ => addition[idx].parcel,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_record_lands_in_exactly_one_canonical_record(
        curated in proptest::collection::vec(raw_row(), 0..12),
        addition in proptest::collection::vec(raw_row(), 0..12),
    ) {
        let run = build_registry(&record_sets(&curated, &addition), &RegistryConfig::default()).unwrap();

        let mut seen: BTreeMap<SourceRecordId, usize> = BTreeMap::new();
        for record in run.registry.records() {
            prop_assert!(!record.member_source_ids.is_empty());
            for id in &record.member_source_ids {
                *seen.entry(id.clone()).or_default() += 1;
            }
        }
        prop_assert_eq!(seen.len(), curated.len() + addition.len());
        prop_assert!(seen.values().all(|n| *n == 1));
    }

    #[test]
    fn distinct_parcels_never_share_a_canonical_record(
        curated in proptest::collection::vec(raw_row(), 0..12),
        addition in proptest::collection::vec(raw_row(), 0..12),
    ) {
        let run = build_registry(&record_sets(&curated, &addition), &RegistryConfig::default()).unwrap();
        for record in run.registry.records() {
            let parcels: BTreeSet<usize> = record
                .member_source_ids
                .iter()
                .filter_map(|id| parcel_of(&curated, &addition, id))
                .collect();
            prop_assert!(parcels.len() <= 1, "{:?} merges parcels {:?}", record.member_source_ids, parcels);
        }
    }

    #[test]
    fn rerun_reproduces_ids_and_values(
        curated in proptest::collection::vec(raw_row(), 0..10),
        addition in proptest::collection::vec(raw_row(), 0..10),
    ) {
        let sets = record_sets(&curated, &addition);
        let first = build_registry(&sets, &RegistryConfig::default()).unwrap();
        let mut single = RegistryConfig::default();
        single.workers = 1;
        let second = build_registry(&sets, &single).unwrap();
        prop_assert_eq!(first.registry.fingerprint().unwrap(), second.registry.fingerprint().unwrap());
        prop_assert_eq!(&first.registry, &second.registry);
    }

    #[test]
    fn merged_values_come_from_members(
        curated in proptest::collection::vec(raw_row(), 1..10),
        addition in proptest::collection::vec(raw_row(), 0..10),
    ) {
        let run = build_registry(&record_sets(&curated, &addition), &RegistryConfig::default()).unwrap();
        let curated_source = SourceName::new("curated");
        for record in run.registry.records() {
            for (_, winner) in record.provenance.iter() {
                prop_assert!(record.member_source_ids.binary_search(winner).is_ok());
            }
            // Curated outranks addition, so a curated name always wins when one exists.
            let curated_named = record.member_source_ids.iter().any(|id| {
                id.source_name == curated_source
                    && curated[id.source_id.parse::<usize>().unwrap()].name.is_some()
            });
            if curated_named {
                prop_assert_eq!(
                    record.provenance.source_of(building_registry::Attribute::Name),
                    Some(&curated_source)
                );
            }
        }
    }
}
