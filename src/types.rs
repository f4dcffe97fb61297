use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One geolocation sample component (latitude or longitude), 32-bit float
pub type GeoSample = f32;

/// 2D geolocation sample block (line x pixel), row-major
pub type GeoSamples = Array2<GeoSample>;

/// Shared, immutable geolocation band. Geocodings built from the same
/// band pair compare equal by pointer identity, not by value.
pub type GeoBand = Arc<GeoSamples>;

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f32,
    pub lon: f32,
}

impl GeoPos {
    pub fn new(lat: f32, lon: f32) -> Self {
        Self { lat, lon }
    }

    /// A sample is usable only when both components are inside the
    /// geographic range; fill values (e.g. -999) fall outside it.
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lon >= -180.0 && self.lon <= 180.0
    }
}

/// Continuous pixel position, x across track, y along track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f32,
    pub y: f32,
}

impl PixelPos {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Error types for geocoding construction
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("scan height must be at least 2, got {0}")]
    InvalidScanHeight(usize),

    #[error("latitude shape {lat:?} does not match longitude shape {lon:?}")]
    ShapeMismatch {
        lat: (usize, usize),
        lon: (usize, usize),
    },

    #[error("swath has no samples")]
    EmptySwath,

    #[error("tie-point grids are not compatible: {0}")]
    IncompatibleGrids(String),

    #[error("subsampling {subsampling} does not divide scan height {scan_height}")]
    IncompatibleSubsampling {
        subsampling: usize,
        scan_height: usize,
    },
}

/// Result type for geocoding operations
pub type GeoResult<T> = Result<T, GeoError>;
