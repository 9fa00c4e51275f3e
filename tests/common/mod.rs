use std::{fs, path::Path};

use geojson::{FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use supercluster_engine::{Feature, Options};

#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn get_options(radius: f64, extent: f64, min_points: usize, max_zoom: u8) -> Options {
    Options {
        radius,
        extent,
        max_zoom,
        min_zoom: 0,
        min_points,
        node_size: 64,
        generate_id: false,
    }
}

#[allow(dead_code)]
pub fn load_places() -> Vec<geojson::Feature> {
    let file_path = Path::new("./tests/common/places.json");
    let json_string = fs::read_to_string(file_path).expect("places.json was not found");
    let collection: FeatureCollection =
        serde_json::from_str(&json_string).expect("places.json was not parsed");

    collection.features
}

#[allow(dead_code)]
pub fn point(lng: f64, lat: f64) -> geojson::Feature {
    geojson::Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![lng, lat]))),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

#[allow(dead_code)]
pub fn named_point(lng: f64, lat: f64, name: &str) -> geojson::Feature {
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), JsonValue::from(name));

    geojson::Feature {
        properties: Some(properties),
        ..point(lng, lat)
    }
}

/// Name property of an unclustered point.
#[allow(dead_code)]
pub fn name_of(feature: &Feature) -> String {
    feature
        .properties()
        .and_then(|properties| properties.get("name").cloned())
        .and_then(|name| name.as_str().map(str::to_string))
        .expect("feature has no name")
}

/// `(point_count, cluster_id)` pairs, for comparing query results.
#[allow(dead_code)]
pub fn summarize(features: &[Feature]) -> Vec<(usize, Option<usize>)> {
    features
        .iter()
        .map(|feature| (feature.point_count(), feature.cluster_id()))
        .collect()
}
