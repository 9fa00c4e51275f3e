//! Spherical Mercator projection into the unit square, and bounding box normalization.
//!
//! Projected coordinates grow eastwards in `x` and southwards in `y`, both in `[0, 1]`.

use std::f64::consts::PI;

/// Geographic bounding box as `[west, south, east, north]` in degrees.
pub type BBox = [f64; 4];

/// Convert longitude to spherical mercator in the [0..1] range.
pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Convert latitude to spherical mercator in the [0..1] range.
///
/// Latitudes beyond the Mercator limit (including the poles) are clamped to the
/// top and bottom edges.
pub fn lat_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - (0.25 * ((1.0 + sin) / (1.0 - sin)).ln()) / PI;

    y.clamp(0.0, 1.0)
}

/// Convert spherical mercator `x` back to longitude.
pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Convert spherical mercator `y` back to latitude.
pub fn y_lat(y: f64) -> f64 {
    let y2 = ((180.0 - y * 360.0) * PI) / 180.0;

    (360.0 * y2.exp().atan()) / PI - 90.0
}

/// Wrap a longitude into `[-180, 180)`.
fn wrap_lng(lng: f64) -> f64 {
    (((lng + 180.0) % 360.0) + 360.0) % 360.0 - 180.0
}

/// Normalize a bounding box into at most two non-wrapping boxes.
///
/// Longitudes are wrapped, latitudes clamped, and a box spanning 360 degrees or
/// more becomes the whole world. A box whose wrapped west edge lies east of its
/// east edge crosses the antimeridian and is split into `[west, 180]` and
/// `[-180, east]`. Boxes with NaN components normalize to nothing.
pub fn normalize_bbox(bbox: BBox) -> Vec<BBox> {
    if bbox.iter().any(|v| v.is_nan()) {
        return Vec::new();
    }

    let south = bbox[1].clamp(-90.0, 90.0);
    let north = bbox[3].clamp(-90.0, 90.0);

    if bbox[2] - bbox[0] >= 360.0 {
        return vec![[-180.0, south, 180.0, north]];
    }

    let west = wrap_lng(bbox[0]);
    let east = if bbox[2] == 180.0 { 180.0 } else { wrap_lng(bbox[2]) };

    if !west.is_finite() || !east.is_finite() {
        return Vec::new();
    }

    if west > east {
        vec![[west, south, 180.0, north], [-180.0, south, east, north]]
    } else {
        vec![[west, south, east, north]]
    }
}

/// Project a non-wrapping geographic box to `[min_x, min_y, max_x, max_y]`.
pub fn project_bbox(bbox: BBox) -> [f64; 4] {
    [lng_x(bbox[0]), lat_y(bbox[3]), lng_x(bbox[2]), lat_y(bbox[1])]
}
