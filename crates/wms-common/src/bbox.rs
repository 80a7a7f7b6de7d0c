//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic bounding box.
///
/// Dataset extents are always reported in WGS84 (EPSG:4326) degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Compute the extent of a set of longitude/latitude coordinates.
    ///
    /// Non-finite values (fill values already mapped to NaN) are skipped.
    /// Longitudes on a 0..360 convention are folded into -180..180.
    /// Returns `None` when no finite coordinate pair remains.
    pub fn from_coordinates(lons: &[f64], lats: &[f64]) -> Option<Self> {
        let mut bbox: Option<BoundingBox> = None;

        for lon in lons.iter().copied().filter(|v| v.is_finite()) {
            let lon = normalize_longitude(lon);
            bbox = Some(match bbox {
                Some(b) => BoundingBox {
                    min_x: b.min_x.min(lon),
                    max_x: b.max_x.max(lon),
                    ..b
                },
                None => BoundingBox::new(lon, f64::INFINITY, lon, f64::NEG_INFINITY),
            });
        }

        let mut bbox = bbox?;
        for lat in lats.iter().copied().filter(|v| v.is_finite()) {
            bbox.min_y = bbox.min_y.min(lat);
            bbox.max_y = bbox.max_y.max(lat);
        }

        if bbox.min_y.is_finite() && bbox.max_y.is_finite() {
            Some(bbox)
        } else {
            None
        }
    }
}

/// Fold a longitude into the -180..180 range.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}
