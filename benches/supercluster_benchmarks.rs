use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geojson::{Geometry, Value};
use supercluster_engine::{MapDimensions, Options, Region, Supercluster};

/// Deterministic points scattered around a handful of city-like hot spots.
fn generate_points(count: usize) -> Vec<geojson::Feature> {
    const HOT_SPOTS: [[f64; 2]; 5] = [
        [4.90, 52.37],
        [-74.01, 40.71],
        [139.69, 35.69],
        [-43.17, -22.91],
        [151.21, -33.87],
    ];

    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };

    (0..count)
        .map(|i| {
            let [lng, lat] = HOT_SPOTS[i % HOT_SPOTS.len()];
            let spread = if i % 10 == 0 { 60.0 } else { 2.0 };

            geojson::Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    (lng + (next() - 0.5) * spread).clamp(-180.0, 180.0),
                    (lat + (next() - 0.5) * spread).clamp(-85.0, 85.0),
                ]))),
                id: None,
                properties: None,
                foreign_members: None,
            }
        })
        .collect()
}

fn loaded_index(count: usize) -> Supercluster {
    let mut index = Supercluster::new(Options::default());

    index.load(generate_points(count)).unwrap();
    index
}

fn benchmark_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for count in [1_000, 10_000, 100_000] {
        let points = generate_points(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| {
                let mut index = Supercluster::new(Options::default());

                index.load(black_box(points.clone())).unwrap();
                index
            })
        });
    }

    group.finish();
}

fn benchmark_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let index = loaded_index(100_000);

    group.bench_function("get_clusters_world_z0", |b| {
        b.iter(|| {
            index
                .get_clusters(black_box([-180.0, -85.0, 180.0, 85.0]), black_box(0.0))
                .unwrap()
        })
    });

    group.bench_function("get_clusters_city_z10", |b| {
        b.iter(|| {
            index
                .get_clusters(black_box([4.5, 52.0, 5.3, 52.7]), black_box(10.0))
                .unwrap()
        })
    });

    group.bench_function("get_clusters_from_region", |b| {
        let region = Region {
            latitude: 40.71,
            longitude: -74.01,
            latitude_delta: 1.0,
            longitude_delta: 1.0,
        };
        let map = MapDimensions {
            width: 1080.0,
            height: 1920.0,
        };

        b.iter(|| index.get_clusters_from_region(black_box(&region), map).unwrap())
    });

    group.bench_function("get_tile_z0", |b| {
        b.iter(|| index.get_tile(black_box(0), black_box(0), black_box(0)).unwrap())
    });

    let cluster_id = index
        .get_clusters([-180.0, -85.0, 180.0, 85.0], 0.0)
        .unwrap()
        .iter()
        .find_map(|feature| feature.cluster_id())
        .unwrap();

    group.bench_function("get_leaves_first_page", |b| {
        b.iter(|| index.get_leaves(black_box(cluster_id), 10, 0).unwrap())
    });

    group.bench_function("get_cluster_expansion_zoom", |b| {
        b.iter(|| index.get_cluster_expansion_zoom(black_box(cluster_id)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, benchmark_load, benchmark_queries);
criterion_main!(benches);
