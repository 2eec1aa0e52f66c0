//! Spatial query benchmarks.
//!
//! Compares the grid-indexed path against the scan + predicate fallback for
//! bounding-box, radius and point-in-polygon queries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geostore::{
    BoundsQuery, ContainsPointQuery, GeoDB, NewPoint, NewPolygon, RadiusQuery, StoreConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

// ============================================================================
// Test Data Generation
// ============================================================================

fn square(lat: f64, lng: f64, size_deg: f64) -> serde_json::Value {
    let half = size_deg / 2.0;
    json!({"type": "Polygon", "coordinates": [[
        [lng - half, lat - half], [lng + half, lat - half], [lng + half, lat + half],
        [lng - half, lat + half], [lng - half, lat - half]
    ]]})
}

fn populate(config: StoreConfig, points: usize, polygons: usize) -> GeoDB {
    let db = GeoDB::open(config).expect("open store");
    let mut rng = StdRng::seed_from_u64(42);
    for i in 0..points {
        let lat = rng.gen_range(-60.0..60.0);
        let lng = rng.gen_range(-180.0..180.0);
        db.create_point(NewPoint::new(format!("p{}", i), lat, lng))
            .expect("create point");
    }
    for i in 0..polygons {
        let lat = rng.gen_range(-60.0..60.0);
        let lng = rng.gen_range(-170.0..170.0);
        db.create_polygon(NewPolygon::new(format!("poly{}", i), square(lat, lng, 2.0)))
            .expect("create polygon");
    }
    db
}

fn stores(size: usize) -> [(&'static str, GeoDB); 2] {
    [
        ("native", populate(StoreConfig::for_testing(), size, size / 10)),
        ("fallback", populate(StoreConfig::fallback_only(), size, size / 10)),
    ]
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_queries(c: &mut Criterion) {
    let bounds = BoundsQuery::new(10.0, 0.0, 10.0, 0.0).expect("bounds");
    let radius = RadiusQuery::new(45.0, -100.0, 500.0).expect("radius");
    let contains = ContainsPointQuery::new(5.0, 5.0).expect("point");

    for size in [1_000usize, 10_000] {
        let mut group = c.benchmark_group(format!("spatial_{}", size));
        for (path, db) in stores(size) {
            group.bench_with_input(BenchmarkId::new("bounds", path), &db, |b, db| {
                b.iter(|| {
                    let hits = db.points_in_bounds(black_box(&bounds)).expect("query");
                    black_box(hits.count())
                })
            });
            group.bench_with_input(BenchmarkId::new("radius", path), &db, |b, db| {
                b.iter(|| {
                    let hits = db.points_within_radius(black_box(&radius)).expect("query");
                    black_box(hits.count())
                })
            });
            group.bench_with_input(BenchmarkId::new("contains", path), &db, |b, db| {
                b.iter(|| {
                    let hits = db.polygons_containing(black_box(&contains)).expect("query");
                    black_box(hits.count())
                })
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
