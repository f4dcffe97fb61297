use crate::core::stripe::{Stripe, StripeBuilder};
use crate::types::{GeoBand, GeoPos, GeoResult, PixelPos};
use std::sync::Arc;

/// Forward/inverse coordinate mapping for a complete scene.
///
/// Both query directions return `None` for positions outside the swath's
/// valid coverage; that is an expected outcome during normal use (e.g.
/// reprojecting to a grid larger than the swath footprint), not an error.
pub trait GeoCoding {
    /// Pixel position to geographic position
    fn geo_pos(&self, pixel: PixelPos) -> Option<GeoPos>;

    /// Geographic position to pixel position
    fn pixel_pos(&self, geo: GeoPos) -> Option<PixelPos>;

    /// Whether any part of the scene crosses the +/-180 meridian
    fn crosses_antimeridian(&self) -> bool;
}

/// Bow-tie geocoding over full-resolution per-pixel latitude/longitude
/// bands.
///
/// The swath is decomposed into per-scan stripes at construction; forward
/// queries dispatch to the stripe containing the row, inverse queries run
/// the quad-tree search over candidate stripes ordered by center-line
/// proximity.
pub struct SwathPixelGeoCoding {
    lat_band: GeoBand,
    lon_band: GeoBand,
    scene_width: usize,
    scene_height: usize,
    scan_height: usize,
    scanline_offset: usize,
    stripes: Vec<Option<Stripe>>,
    valid_range: Option<(usize, usize)>,
    crosses_antimeridian: bool,
}

impl SwathPixelGeoCoding {
    /// Build the geocoding from a pair of full-resolution geolocation bands
    /// and the sensor's detector count per scan.
    pub fn new(lat_band: GeoBand, lon_band: GeoBand, scan_height: usize) -> GeoResult<Self> {
        let built = StripeBuilder::new(&lat_band, &lon_band, scan_height)?.build()?;
        let (scene_height, scene_width) = lat_band.dim();

        log::info!(
            "pixel geocoding: {}x{} scene, scan height {}, offset {}",
            scene_width,
            scene_height,
            scan_height,
            built.scanline_offset
        );

        Ok(Self {
            lat_band,
            lon_band,
            scene_width,
            scene_height,
            scan_height,
            scanline_offset: built.scanline_offset,
            stripes: built.stripes,
            valid_range: built.valid_range,
            crosses_antimeridian: built.crosses_antimeridian,
        })
    }

    pub fn scene_width(&self) -> usize {
        self.scene_width
    }

    pub fn scene_height(&self) -> usize {
        self.scene_height
    }

    /// Number of detector lines per physical scan
    pub fn scan_height(&self) -> usize {
        self.scan_height
    }

    /// Lines between the start of the tiling grid and the first data line
    pub fn scanline_offset(&self) -> usize {
        self.scanline_offset
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Rebuild an equivalent geocoding for a cropped or resampled copy of
    /// the swath. The new band pair must follow the same scan-height
    /// semantics as the original.
    pub fn transfer(&self, lat_band: GeoBand, lon_band: GeoBand) -> GeoResult<Self> {
        Self::new(lat_band, lon_band, self.scan_height)
    }

    /// Candidate stripe indices for an inverse query, nearest center line
    /// first. Every non-degenerate stripe remains a candidate; the ordering
    /// only front-loads the likely hit.
    fn candidate_stripes(&self, lat: f32, lon: f32) -> Vec<usize> {
        let (lo, hi) = match self.valid_range {
            Some(range) => range,
            None => return Vec::new(),
        };
        let mut candidates: Vec<(usize, f32)> = (lo..=hi)
            .filter_map(|i| {
                self.stripes[i]
                    .as_ref()
                    .map(|s| (i, s.center_line.squared_distance(lat, lon)))
            })
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.into_iter().map(|(i, _)| i).collect()
    }
}

impl GeoCoding for SwathPixelGeoCoding {
    fn geo_pos(&self, pixel: PixelPos) -> Option<GeoPos> {
        if !pixel.x.is_finite() || !pixel.y.is_finite() {
            return None;
        }
        if pixel.y < 0.0 || pixel.y >= self.scene_height as f32 {
            return None;
        }
        let grid_y = pixel.y + self.scanline_offset as f32;
        let index = (grid_y / self.scan_height as f32).floor() as usize;
        let stripe = self.stripes.get(index)?.as_ref()?;
        let local_y = grid_y - (index * self.scan_height) as f32;
        stripe.geocoding.geo_pos(pixel.x, local_y)
    }

    fn pixel_pos(&self, geo: GeoPos) -> Option<PixelPos> {
        if !geo.is_valid() {
            return None;
        }
        for index in self.candidate_stripes(geo.lat, geo.lon) {
            let stripe = match self.stripes[index].as_ref() {
                Some(stripe) => stripe,
                None => continue,
            };
            if let Some((x, y)) = stripe.geocoding.pixel_pos(geo.lat, geo.lon) {
                let scene_y =
                    (index * self.scan_height + y) as f32 - self.scanline_offset as f32 + 0.5;
                // hits in synthesized boundary rows fall outside the scene;
                // try the remaining stripes
                if scene_y >= 0.0 && scene_y < self.scene_height as f32 {
                    return Some(PixelPos::new(x as f32 + 0.5, scene_y));
                }
            }
        }
        None
    }

    fn crosses_antimeridian(&self) -> bool {
        self.crosses_antimeridian
    }
}

/// Two geocodings are equal when they are backed by the very same band
/// objects, not when their samples happen to match.
impl PartialEq for SwathPixelGeoCoding {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.lat_band, &other.lat_band)
            && Arc::ptr_eq(&self.lon_band, &other.lon_band)
            && self.scan_height == other.scan_height
    }
}

impl Eq for SwathPixelGeoCoding {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use std::sync::Arc;

    /// Swath of overlapping scans: scan `s` starts at 50 - s and loses half
    /// a degree per detector line, so consecutive scans overlap by half the
    /// scan span. Longitude is constant per column.
    fn swath_bands(width: usize, height: usize, scan_height: usize) -> (GeoBand, GeoBand) {
        let lats = Array2::from_shape_fn((height, width), |(y, _)| {
            let scan = y / scan_height;
            let line = y % scan_height;
            50.0 - scan as f32 - line as f32 * 0.5
        });
        let lons = Array2::from_shape_fn((height, width), |(_, x)| 30.0 + x as f32 * 0.1);
        (Arc::new(lats), Arc::new(lons))
    }

    #[test]
    fn test_forward_dispatches_to_enclosing_stripe() {
        let (lats, lons) = swath_bands(8, 12, 4);
        let gc = SwathPixelGeoCoding::new(lats, lons, 4).unwrap();

        // row 5 = scan 1, line 1 -> lat 48.5; row centers at y + 0.5
        let pos = gc.geo_pos(PixelPos::new(1.5, 5.5)).expect("invalid");
        assert_abs_diff_eq!(pos.lat, 48.5, epsilon = 1e-4);
        assert_abs_diff_eq!(pos.lon, 30.1, epsilon = 1e-4);
    }

    #[test]
    fn test_forward_outside_scene() {
        let (lats, lons) = swath_bands(8, 12, 4);
        let gc = SwathPixelGeoCoding::new(lats, lons, 4).unwrap();

        assert!(gc.geo_pos(PixelPos::new(1.0, -0.5)).is_none());
        assert!(gc.geo_pos(PixelPos::new(1.0, 12.0)).is_none());
        assert!(gc.geo_pos(PixelPos::new(f32::NAN, 1.0)).is_none());
    }

    #[test]
    fn test_inverse_round_trip_within_one_pixel() {
        let (lats, lons) = swath_bands(16, 16, 4);
        let gc = SwathPixelGeoCoding::new(lats, lons, 4).unwrap();

        for &(x, y) in &[(1.5f32, 1.5f32), (7.5, 6.5), (14.5, 13.5), (3.5, 9.5)] {
            let geo = gc.geo_pos(PixelPos::new(x, y)).expect("forward failed");
            let pix = gc.pixel_pos(geo).expect("inverse failed");
            assert!(
                (pix.x - x).abs() <= 1.0 && (pix.y - y).abs() <= 1.0,
                "round trip ({}, {}) -> ({}, {})",
                x,
                y,
                pix.x,
                pix.y
            );
        }
    }

    #[test]
    fn test_inverse_outside_swath() {
        let (lats, lons) = swath_bands(8, 12, 4);
        let gc = SwathPixelGeoCoding::new(lats, lons, 4).unwrap();

        assert!(gc.pixel_pos(GeoPos::new(-20.0, 30.0)).is_none());
        assert!(gc.pixel_pos(GeoPos::new(48.5, 120.0)).is_none());
        assert!(gc.pixel_pos(GeoPos::new(-999.0, 30.0)).is_none());
    }

    #[test]
    fn test_degenerate_stripe_queries_fail_cleanly() {
        let width = 8;
        let height = 12;
        let mut lats = Array2::from_shape_fn((height, width), |(y, _)| {
            let scan = y / 4;
            let line = y % 4;
            50.0 - scan as f32 - line as f32 * 0.5
        });
        let lons = Array2::from_shape_fn((height, width), |(_, x)| 30.0 + x as f32 * 0.1);
        // middle scan is all fill
        for y in 4..8 {
            for x in 0..width {
                lats[[y, x]] = -999.0;
            }
        }
        let gc = SwathPixelGeoCoding::new(Arc::new(lats), Arc::new(lons), 4).unwrap();

        // forward queries into the degenerate stripe report invalid
        assert!(gc.geo_pos(PixelPos::new(1.5, 5.5)).is_none());
        // queries into healthy stripes still work
        assert!(gc.geo_pos(PixelPos::new(1.5, 1.5)).is_some());
        assert!(gc.geo_pos(PixelPos::new(1.5, 9.5)).is_some());
    }

    #[test]
    fn test_equality_is_band_identity() {
        let (lats, lons) = swath_bands(8, 12, 4);
        let gc1 = SwathPixelGeoCoding::new(lats.clone(), lons.clone(), 4).unwrap();
        let gc2 = SwathPixelGeoCoding::new(lats.clone(), lons.clone(), 4).unwrap();
        assert!(gc1 == gc2);

        // identical values, different backing arrays
        let lats2 = Arc::new((*lats).clone());
        let lons2 = Arc::new((*lons).clone());
        let gc3 = SwathPixelGeoCoding::new(lats2, lons2, 4).unwrap();
        assert!(gc1 != gc3);
    }

    #[test]
    fn test_transfer_rebuilds_with_same_scan_height() {
        let (lats, lons) = swath_bands(8, 12, 4);
        let gc = SwathPixelGeoCoding::new(lats, lons, 4).unwrap();

        let (sub_lats, sub_lons) = swath_bands(8, 8, 4);
        let transferred = gc.transfer(sub_lats, sub_lons).unwrap();
        assert_eq!(transferred.scan_height(), 4);
        assert_eq!(transferred.scene_height(), 8);
        assert!(transferred.geo_pos(PixelPos::new(1.5, 1.5)).is_some());
    }

    #[test]
    fn test_crosses_antimeridian_aggregates_stripes() {
        let width = 8;
        let height = 8;
        let lats = Array2::from_shape_fn((height, width), |(y, _)| {
            let scan = y / 4;
            let line = y % 4;
            10.0 - scan as f32 - line as f32 * 0.5
        });
        // only the lower scan wraps through the meridian
        let lons = Array2::from_shape_fn((height, width), |(y, x)| {
            if y < 4 {
                170.0 + x as f32 * 0.5
            } else {
                let lon = 177.0 + x as f32;
                if lon > 180.0 {
                    lon - 360.0
                } else {
                    lon
                }
            }
        });
        let gc = SwathPixelGeoCoding::new(Arc::new(lats), Arc::new(lons), 4).unwrap();
        assert!(gc.crosses_antimeridian());
    }
}
