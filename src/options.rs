use serde::{Deserialize, Serialize};

use crate::error::{Result, SuperclusterError};

/// Highest supported `max_zoom`; cluster ids reserve 5 bits for `zoom + 1`.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Supercluster configuration options
///
/// Field names deserialize from camelCase (`minZoom`, `generateId`, ...) and every
/// field is optional, falling back to its default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Min zoom level to generate clusters on
    pub min_zoom: u8,

    /// Max zoom level to cluster the points on
    pub max_zoom: u8,

    /// Minimum points to form a cluster
    pub min_points: usize,

    /// Cluster radius in pixels
    pub radius: f64,

    /// Tile extent (radius is calculated relative to it)
    pub extent: f64,

    /// Size of the KD-tree leaf node, affects performance
    pub node_size: usize,

    /// Whether to generate numeric ids for input features that have none
    pub generate_id: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
            radius: 40.0,
            extent: 512.0,
            node_size: 64,
            generate_id: false,
        }
    }
}

impl Options {
    /// Parse options from a JSON object and validate them.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Options = serde_json::from_str(json)?;

        options.validate()?;

        Ok(options)
    }

    /// Check that the options describe a buildable hierarchy.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(SuperclusterError::InvalidOptions(reason));

        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return invalid(format!(
                "maxZoom {} exceeds the supported maximum of {}",
                self.max_zoom, MAX_SUPPORTED_ZOOM
            ));
        }
        if self.min_zoom > self.max_zoom {
            return invalid(format!(
                "minZoom {} is greater than maxZoom {}",
                self.min_zoom, self.max_zoom
            ));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return invalid(format!("radius must be positive, got {}", self.radius));
        }
        if !(self.extent.is_finite() && self.extent > 0.0) {
            return invalid(format!("extent must be positive, got {}", self.extent));
        }
        if self.min_points == 0 {
            return invalid("minPoints must be at least 1".to_string());
        }
        if self.node_size == 0 {
            return invalid("nodeSize must be at least 1".to_string());
        }

        Ok(())
    }

    /// Cluster merge radius at `zoom`, in projected units.
    pub(crate) fn radius_at(&self, zoom: i32) -> f64 {
        self.radius / (self.extent * 2f64.powi(zoom))
    }
}
