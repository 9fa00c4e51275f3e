use geojson::{feature::Id, Geometry, JsonObject, JsonValue, Value};
use serde::Serialize;

/// An input point returned as-is: its original coordinates, id and properties.
#[derive(Clone, Debug, PartialEq)]
pub struct PointFeature {
    /// Caller-supplied feature id, or the generated one when `generate_id` is set
    pub id: Option<Id>,

    /// Longitude and latitude of the point
    pub coordinates: [f64; 2],

    /// Properties of the input feature, untouched
    pub properties: Option<JsonObject>,
}

/// A synthetic node aggregating nearby points at some zoom level.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterFeature {
    /// Cluster's unique identifier, usable with the navigation methods
    pub cluster_id: usize,

    /// Number of input points aggregated by the cluster
    pub point_count: usize,

    /// An abbreviated point count, useful for display
    pub point_count_abbreviated: String,

    /// Longitude and latitude of the weighted center of the cluster
    pub coordinates: [f64; 2],
}

impl ClusterFeature {
    /// Cluster metadata in the conventional GeoJSON property layout.
    pub fn properties(&self) -> JsonObject {
        let mut properties = JsonObject::new();

        properties.insert("cluster".to_string(), JsonValue::Bool(true));
        properties.insert("cluster_id".to_string(), self.cluster_id.into());
        properties.insert("point_count".to_string(), self.point_count.into());
        properties.insert(
            "point_count_abbreviated".to_string(),
            JsonValue::String(self.point_count_abbreviated.clone()),
        );

        properties
    }
}

/// A node visible at some zoom level: either an input point or a cluster.
#[derive(Clone, Debug, PartialEq)]
pub enum Feature {
    Point(PointFeature),
    Cluster(ClusterFeature),
}

impl Feature {
    /// Longitude and latitude of the feature.
    pub fn coordinates(&self) -> [f64; 2] {
        match self {
            Feature::Point(point) => point.coordinates,
            Feature::Cluster(cluster) => cluster.coordinates,
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Feature::Cluster(_))
    }

    /// The cluster id, if the feature is a cluster.
    pub fn cluster_id(&self) -> Option<usize> {
        match self {
            Feature::Point(_) => None,
            Feature::Cluster(cluster) => Some(cluster.cluster_id),
        }
    }

    /// Number of input points represented by the feature (1 for a point).
    pub fn point_count(&self) -> usize {
        match self {
            Feature::Point(_) => 1,
            Feature::Cluster(cluster) => cluster.point_count,
        }
    }

    /// Feature id: the point's id, or the cluster id for clusters.
    pub fn id(&self) -> Option<Id> {
        match self {
            Feature::Point(point) => point.id.clone(),
            Feature::Cluster(cluster) => Some(Id::Number(cluster.cluster_id.into())),
        }
    }

    /// Feature properties: the point's own, or the cluster metadata.
    pub fn properties(&self) -> Option<JsonObject> {
        match self {
            Feature::Point(point) => point.properties.clone(),
            Feature::Cluster(cluster) => Some(cluster.properties()),
        }
    }
}

impl From<Feature> for geojson::Feature {
    fn from(feature: Feature) -> Self {
        let id = feature.id();
        let coordinates = feature.coordinates();
        let properties = match feature {
            Feature::Point(point) => point.properties,
            Feature::Cluster(cluster) => Some(cluster.properties()),
        };

        geojson::Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(coordinates.to_vec()))),
            id,
            properties,
            foreign_members: None,
        }
    }
}

/// Vector tile feature type tag for points.
pub const TILE_FEATURE_POINT: u8 = 1;

/// A feature rendered into tile-local pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileFeature {
    /// Geometry type, always [`TILE_FEATURE_POINT`]
    #[serde(rename = "type")]
    pub r#type: u8,

    /// A single `[x, y]` pixel position within the tile extent
    pub geometry: Vec<[i64; 2]>,

    /// Cluster metadata, or the properties of the input point
    pub tags: JsonObject,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

/// Collection of features in a specific tile
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Tile {
    pub features: Vec<TileFeature>,
}

/// Format a point count for display: `"1.3k"` for 1298, `"13k"` for 12_980.
pub fn abbreviate_count(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round())
    } else if count >= 1000 {
        format!("{}k", (count as f64 / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}
