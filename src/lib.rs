//! bowtie-geo: A Fast, Modular Bow-Tie Swath Geocoding Engine
//!
//! This library geo-references wide-swath imager data (MODIS, VIIRS and
//! similar bow-tie sensors) by decomposing a swath into per-scan stripes,
//! extrapolating partial boundary scans, and inverting (lat, lon) to
//! (pixel, line) with a quad-tree nearest-neighbor search that stays
//! correct across the +/-180 meridian.

pub mod core;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::core::{
    GeoCoding, GridLayout, QuadTreeLocator, StripeBuilder, StripeGeoCoding, SwathPixelGeoCoding,
    SwathTiePointGeoCoding, TiePointGrid,
};
pub use types::{GeoBand, GeoError, GeoPos, GeoResult, GeoSample, GeoSamples, PixelPos};
