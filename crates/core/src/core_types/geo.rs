//! Geolocation: representative points and lat/lng bounding boxes

use crate::error::{ConfigError, FireDataError};
use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Bit-exact key; two points share a key only if both coordinates are identical
    pub fn bits(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lng.to_bits())
    }
}

/// Anything that resolves to a single representative point
pub trait Geolocated {
    /// # Errors
    /// Returns [`FireDataError::MissingLocation`] when there is no point or geometry
    fn lat_lng(&self) -> Result<LatLng, FireDataError>;
}

/// Centroid of a polygon ring given as `[lng, lat]` pairs.
///
/// Uses the shoelace formula; rings with (near) zero area fall back to the vertex mean.
/// A closing vertex equal to the first is ignored.
pub fn polygon_centroid(ring: &[[f64; 2]]) -> Option<LatLng> {
    let mut pts = ring;
    if pts.len() > 1 && pts.first() == pts.last() {
        pts = &pts[..pts.len() - 1];
    }
    if pts.is_empty() {
        return None;
    }

    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, p) in pts.iter().enumerate() {
        let q = pts[(i + 1) % pts.len()];
        let cross = p[0] * q[1] - q[0] * p[1];
        twice_area += cross;
        cx += (p[0] + q[0]) * cross;
        cy += (p[1] + q[1]) * cross;
    }

    if twice_area.abs() < 1e-12 {
        let n = pts.len() as f64;
        let lng = pts.iter().map(|p| p[0]).sum::<f64>() / n;
        let lat = pts.iter().map(|p| p[1]).sum::<f64>() / n;
        return Some(LatLng::new(lat, lng));
    }

    let factor = 1.0 / (3.0 * twice_area);
    Some(LatLng::new(cy * factor, cx * factor))
}

/// Lat/lng bounding box as written in config (`sw`/`ne` corners, fields optional
/// so that a missing value can be reported by name)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    #[serde(default)]
    pub sw: Option<CornerConfig>,
    #[serde(default)]
    pub ne: Option<CornerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CornerConfig {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// A validated bounding box. Boxes spanning the antimeridian are not supported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub sw: LatLng,
    pub ne: LatLng,
}

impl Boundary {
    /// Validate a configured boundary.
    ///
    /// `prefix` is the dotted config path used in error messages.
    ///
    /// # Errors
    /// Missing corners or coordinates, out-of-range values, or `ne` south/west of `sw`
    pub fn from_config(config: &BoundaryConfig, prefix: &str) -> Result<Self, ConfigError> {
        let corner = |c: &Option<CornerConfig>, name: &str| -> Result<LatLng, ConfigError> {
            let c = c
                .as_ref()
                .ok_or_else(|| ConfigError::missing(format!("{prefix}.{name}")))?;
            let lat = c
                .lat
                .ok_or_else(|| ConfigError::missing(format!("{prefix}.{name}.lat")))?;
            let lng = c
                .lng
                .ok_or_else(|| ConfigError::missing(format!("{prefix}.{name}.lng")))?;
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ConfigError::invalid(
                    format!("{prefix}.{name}.lat"),
                    format!("{lat} outside [-90, 90]"),
                ));
            }
            if !(-180.0..=180.0).contains(&lng) {
                return Err(ConfigError::invalid(
                    format!("{prefix}.{name}.lng"),
                    format!("{lng} outside [-180, 180]"),
                ));
            }
            Ok(LatLng::new(lat, lng))
        };

        let sw = corner(&config.sw, "sw")?;
        let ne = corner(&config.ne, "ne")?;
        if ne.lat < sw.lat {
            return Err(ConfigError::invalid(
                format!("{prefix}.ne.lat"),
                "must not be south of sw.lat",
            ));
        }
        if ne.lng < sw.lng {
            return Err(ConfigError::invalid(
                format!("{prefix}.ne.lng"),
                "must not be west of sw.lng (antimeridian spans unsupported)",
            ));
        }
        Ok(Self { sw, ne })
    }

    /// Inclusive containment test
    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.sw.lat
            && point.lat <= self.ne.lat
            && point.lng >= self.sw.lng
            && point.lng <= self.ne.lng
    }
}
