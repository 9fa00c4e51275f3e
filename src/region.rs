//! Conversions between map viewport regions, bounding boxes and zoom levels.

use serde::{Deserialize, Serialize};

use crate::projection::{lat_y, lng_x, BBox};

/// A map viewport: a center and the half-extents shown around it, in degrees.
///
/// The deltas follow the usual mobile map convention where `longitude_delta` is the
/// distance from the center to the east and west edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

/// Size of the map view in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapDimensions {
    pub width: f64,
    pub height: f64,
}

impl Region {
    /// Bounding box covered by the region, `[west, south, east, north]`.
    ///
    /// A negative longitude delta is read as a span across the antimeridian.
    pub fn to_bbox(&self) -> BBox {
        let lng_delta = if self.longitude_delta < 0.0 {
            self.longitude_delta + 360.0
        } else {
            self.longitude_delta
        };

        [
            self.longitude - lng_delta,
            self.latitude - self.latitude_delta,
            self.longitude + lng_delta,
            self.latitude + self.latitude_delta,
        ]
    }

    /// Smallest region showing every `[longitude, latitude]` position, centered on
    /// their extremes with deltas of twice the covered span.
    ///
    /// Returns `None` when there are no positions.
    pub fn enclosing<I>(positions: I) -> Option<Region>
    where
        I: IntoIterator<Item = [f64; 2]>,
    {
        let mut positions = positions.into_iter();
        let [lng, lat] = positions.next()?;
        let init = (lng, lng, lat, lat);

        let (min_lng, max_lng, min_lat, max_lat) =
            positions.fold(init, |(min_lng, max_lng, min_lat, max_lat), [lng, lat]| {
                (
                    min_lng.min(lng),
                    max_lng.max(lng),
                    min_lat.min(lat),
                    max_lat.max(lat),
                )
            });

        Some(Region {
            latitude: (min_lat + max_lat) / 2.0,
            longitude: (min_lng + max_lng) / 2.0,
            latitude_delta: (max_lat - min_lat) * 2.0,
            longitude_delta: (max_lng - min_lng) * 2.0,
        })
    }
}

/// Highest integer zoom at which `bbox` fits inside a view of `dimensions`,
/// clamped to `[min_zoom, max_zoom]`.
///
/// `tile_size` is the pixel size of one tile at zoom 0. A box whose east edge
/// lies west of its west edge is measured across the antimeridian.
pub fn viewport_zoom(
    bbox: BBox,
    dimensions: MapDimensions,
    min_zoom: u8,
    max_zoom: u8,
    tile_size: f64,
) -> u8 {
    if bbox.iter().any(|v| v.is_nan()) {
        return min_zoom;
    }

    let mut width = lng_x(bbox[2]) - lng_x(bbox[0]);
    let height = lat_y(bbox[1]) - lat_y(bbox[3]);

    if width < 0.0 {
        width += 1.0;
    }

    let scale = f64::max(
        width * tile_size / dimensions.width,
        height.abs() * tile_size / dimensions.height,
    );
    let zoom = (-scale.log2()).floor();

    if zoom.is_nan() {
        return min_zoom;
    }

    zoom.clamp(min_zoom as f64, max_zoom as f64) as u8
}
