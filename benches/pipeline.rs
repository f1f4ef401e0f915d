use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use building_registry::{build_registry, BlockingIndex, GeoPoint, Normalizer, RecordSet, RegistryConfig};

/// Synthetic pair of overlapping sources: every third curated building is
/// repeated in the addition set with a small position jitter.
fn synthetic_sets(buildings: usize) -> Vec<RecordSet> {
    let origin = GeoPoint::new(40.60, -74.10).unwrap();
    let side = (buildings as f64).sqrt().ceil() as usize;

    let mut curated = Vec::with_capacity(buildings);
    let mut addition = Vec::new();
    for i in 0..buildings {
        let (row, col) = (i / side, i % side);
        let p = origin.offset_m(row as f64 * 60.0, col as f64 * 60.0);
        let parcel = format!("1{:09}", i + 1);
        let row_json = |id: String, p: GeoPoint, parcel: Option<&str>| -> Value {
            let mut v = json!({
                "source_id": id,
                "latitude": p.lat(),
                "longitude": p.lng(),
                "year_built": 1900 + (i % 100) as i32,
                "name": format!("Building {i}"),
                "address": format!("{} Broadway", i + 1),
            });
            if let Some(parcel) = parcel {
                v["bbl"] = json!(parcel);
            }
            v
        };
        curated.push(row_json(format!("LP-{i}"), p, Some(&parcel)));
        if i % 3 == 0 {
            addition.push(row_json(format!("NA-{i}"), p.offset_m(4.0, 3.0), None));
        }
    }
    vec![RecordSet::new("curated", curated), RecordSet::new("addition", addition)]
}

fn bench_normalize(c: &mut Criterion) {
    let sets = synthetic_sets(2_000);
    let config = RegistryConfig::default();
    let rows: usize = sets.iter().map(|s| s.rows.len()).sum();

    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(rows as u64));
    group.bench_function("2000_buildings", |b| {
        let normalizer = Normalizer::new(&config);
        b.iter(|| {
            for set in &sets {
                black_box(normalizer.normalize_set(set));
            }
        });
    });
    group.finish();
}

fn bench_blocking(c: &mut Criterion) {
    let config = RegistryConfig::default();
    let normalizer = Normalizer::new(&config);
    let records: Vec<_> = synthetic_sets(2_000)
        .iter()
        .flat_map(|s| normalizer.normalize_set(s).records)
        .collect();

    c.bench_function("blocking/2000_buildings", |b| {
        b.iter(|| black_box(BlockingIndex::build(&records, &config)));
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_registry");
    for buildings in [500usize, 2_000, 8_000] {
        let sets = synthetic_sets(buildings);
        group.throughput(Throughput::Elements(buildings as u64));
        for workers in [1usize, 4] {
            let mut config = RegistryConfig::default();
            config.workers = workers;
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{workers}"), buildings),
                &sets,
                |b, sets| b.iter(|| build_registry(sets, &config).unwrap()),
            );
        }
    }
    group.finish();
}

criterion_group!(pipeline, bench_normalize, bench_blocking, bench_full_pipeline);
criterion_main!(pipeline);
