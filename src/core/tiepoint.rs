use crate::core::stripe::{Stripe, StripeBuilder};
use crate::core::swath::GeoCoding;
use crate::types::{GeoBand, GeoError, GeoPos, GeoResult, PixelPos};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Placement of a subsampled geolocation grid within the full raster.
///
/// Grid sample (0, 0) sits at raster position (`offset_x`, `offset_y`);
/// consecutive grid samples are `subsampling_x`/`subsampling_y` raster
/// pixels apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub offset_x: f32,
    pub offset_y: f32,
    pub subsampling_x: usize,
    pub subsampling_y: usize,
}

/// A subsampled latitude or longitude grid, coarser than the full raster
#[derive(Clone)]
pub struct TiePointGrid {
    pub data: GeoBand,
    pub layout: GridLayout,
}

impl TiePointGrid {
    pub fn new(data: GeoBand, layout: GridLayout) -> Self {
        Self { data, layout }
    }

    pub fn grid_width(&self) -> usize {
        self.data.dim().1
    }

    pub fn grid_height(&self) -> usize {
        self.data.dim().0
    }
}

/// Bow-tie geocoding over a pair of tie-point grids.
///
/// Stripes are built in grid space: a physical scan of `scan_height`
/// detector lines spans `scan_height / subsampling_y` grid rows. Forward
/// queries interpolate bilinearly over the enclosing grid stripe, inverse
/// queries locate the nearest grid sample and map it back through the
/// subsampling transform.
pub struct SwathTiePointGeoCoding {
    lat_grid: TiePointGrid,
    lon_grid: TiePointGrid,
    scene_width: usize,
    scene_height: usize,
    scan_height: usize,
    grid_scan_height: usize,
    grid_scanline_offset: usize,
    stripes: Vec<Option<Stripe>>,
    valid_range: Option<(usize, usize)>,
    crosses_antimeridian: bool,
}

impl SwathTiePointGeoCoding {
    pub fn new(
        lat_grid: TiePointGrid,
        lon_grid: TiePointGrid,
        scan_height: usize,
        scene_width: usize,
        scene_height: usize,
    ) -> GeoResult<Self> {
        if lat_grid.data.dim() != lon_grid.data.dim() || lat_grid.layout != lon_grid.layout {
            return Err(GeoError::IncompatibleGrids(format!(
                "lat {:?}/{:?} vs lon {:?}/{:?}",
                lat_grid.data.dim(),
                lat_grid.layout,
                lon_grid.data.dim(),
                lon_grid.layout
            )));
        }
        let subsampling_y = lat_grid.layout.subsampling_y;
        if subsampling_y == 0 || scan_height % subsampling_y != 0 {
            return Err(GeoError::IncompatibleSubsampling {
                subsampling: subsampling_y,
                scan_height,
            });
        }
        let grid_scan_height = scan_height / subsampling_y;
        if grid_scan_height < 2 {
            return Err(GeoError::IncompatibleSubsampling {
                subsampling: subsampling_y,
                scan_height,
            });
        }

        let built =
            StripeBuilder::new(&lat_grid.data, &lon_grid.data, grid_scan_height)?.build()?;

        log::info!(
            "tie-point geocoding: {}x{} grid over {}x{} scene, grid scan height {}",
            lat_grid.grid_width(),
            lat_grid.grid_height(),
            scene_width,
            scene_height,
            grid_scan_height
        );

        Ok(Self {
            lat_grid,
            lon_grid,
            scene_width,
            scene_height,
            scan_height,
            grid_scan_height,
            grid_scanline_offset: built.scanline_offset,
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

    pub fn scan_height(&self) -> usize {
        self.scan_height
    }

    /// Offset of the first data line from the tiling grid, in raster lines
    pub fn scanline_offset(&self) -> usize {
        self.grid_scanline_offset * self.lat_grid.layout.subsampling_y
    }

    /// Rebuild for a new compatible grid pair, e.g. after cropping
    pub fn transfer(
        &self,
        lat_grid: TiePointGrid,
        lon_grid: TiePointGrid,
        scene_width: usize,
        scene_height: usize,
    ) -> GeoResult<Self> {
        Self::new(lat_grid, lon_grid, self.scan_height, scene_width, scene_height)
    }

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

impl GeoCoding for SwathTiePointGeoCoding {
    fn geo_pos(&self, pixel: PixelPos) -> Option<GeoPos> {
        if !pixel.x.is_finite() || !pixel.y.is_finite() {
            return None;
        }
        if pixel.x < 0.0
            || pixel.x >= self.scene_width as f32
            || pixel.y < 0.0
            || pixel.y >= self.scene_height as f32
        {
            return None;
        }
        let layout = self.lat_grid.layout;
        let gx = (pixel.x - layout.offset_x) / layout.subsampling_x as f32;
        let gy = (pixel.y - layout.offset_y) / layout.subsampling_y as f32;
        if gx < 0.0 || gy < 0.0 {
            return None;
        }

        let grid_y = gy + self.grid_scanline_offset as f32;
        let index = (grid_y / self.grid_scan_height as f32).floor() as usize;
        let stripe = self.stripes.get(index)?.as_ref()?;
        let local_gy = grid_y - (index * self.grid_scan_height) as f32;
        stripe.geocoding.geo_pos_grid(gx, local_gy)
    }

    fn pixel_pos(&self, geo: GeoPos) -> Option<PixelPos> {
        if !geo.is_valid() {
            return None;
        }
        let layout = self.lat_grid.layout;
        for index in self.candidate_stripes(geo.lat, geo.lon) {
            let stripe = match self.stripes[index].as_ref() {
                Some(stripe) => stripe,
                None => continue,
            };
            if let Some((gx, gy)) = stripe.geocoding.pixel_pos(geo.lat, geo.lon) {
                let scene_gy = (index * self.grid_scan_height + gy) as f32
                    - self.grid_scanline_offset as f32;
                let x = layout.offset_x + gx as f32 * layout.subsampling_x as f32;
                let y = layout.offset_y + scene_gy * layout.subsampling_y as f32;
                // hits in synthesized boundary rows fall outside the scene;
                // try the remaining stripes
                if y >= 0.0 && y < self.scene_height as f32 && x < self.scene_width as f32 {
                    return Some(PixelPos::new(x, y));
                }
            }
        }
        None
    }

    fn crosses_antimeridian(&self) -> bool {
        self.crosses_antimeridian
    }
}

/// Equality by identity of the backing grid data, as for the pixel variant
impl PartialEq for SwathTiePointGeoCoding {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.lat_grid.data, &other.lat_grid.data)
            && Arc::ptr_eq(&self.lon_grid.data, &other.lon_grid.data)
            && self.scan_height == other.scan_height
    }
}

impl Eq for SwathTiePointGeoCoding {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    /// 2x-subsampled grid over a 16x16 scene, scan height 4 raster lines
    /// (2 grid rows). Latitude falls 0.5 deg per grid row within a scan.
    fn grids(crossing: bool) -> (TiePointGrid, TiePointGrid) {
        let layout = GridLayout {
            offset_x: 0.5,
            offset_y: 0.5,
            subsampling_x: 2,
            subsampling_y: 2,
        };
        let lats = Array2::from_shape_fn((8, 8), |(gy, _)| {
            let scan = gy / 2;
            let line = gy % 2;
            40.0 - scan as f32 * 0.8 - line as f32 * 0.5
        });
        let lons = Array2::from_shape_fn((8, 8), |(_, gx)| {
            if crossing {
                let lon = 178.0 + gx as f32;
                if lon > 180.0 {
                    lon - 360.0
                } else {
                    lon
                }
            } else {
                20.0 + gx as f32 * 0.5
            }
        });
        (
            TiePointGrid::new(Arc::new(lats), layout),
            TiePointGrid::new(Arc::new(lons), layout),
        )
    }

    #[test]
    fn test_rejects_incompatible_grids() {
        let (lat_grid, lon_grid) = grids(false);
        let mut other_layout = lon_grid.layout;
        other_layout.offset_x = 1.5;
        let bad_lon = TiePointGrid::new(lon_grid.data.clone(), other_layout);
        assert!(matches!(
            SwathTiePointGeoCoding::new(lat_grid, bad_lon, 4, 16, 16),
            Err(GeoError::IncompatibleGrids(_))
        ));
    }

    #[test]
    fn test_rejects_subsampling_not_dividing_scan_height() {
        let (lat_grid, lon_grid) = grids(false);
        assert!(matches!(
            SwathTiePointGeoCoding::new(lat_grid, lon_grid, 5, 16, 16),
            Err(GeoError::IncompatibleSubsampling { .. })
        ));
    }

    #[test]
    fn test_rejects_grid_scan_height_below_two() {
        let (lat_grid, lon_grid) = grids(false);
        // scan height 2 over subsampling 2 leaves a single grid row per scan
        assert!(matches!(
            SwathTiePointGeoCoding::new(lat_grid, lon_grid, 2, 16, 16),
            Err(GeoError::IncompatibleSubsampling { .. })
        ));
    }

    #[test]
    fn test_forward_at_grid_sample() {
        let (lat_grid, lon_grid) = grids(false);
        let gc = SwathTiePointGeoCoding::new(lat_grid, lon_grid, 4, 16, 16).unwrap();

        // raster (0.5, 0.5) is grid sample (0, 0)
        let pos = gc.geo_pos(PixelPos::new(0.5, 0.5)).expect("invalid");
        assert_abs_diff_eq!(pos.lat, 40.0, epsilon = 1e-4);
        assert_abs_diff_eq!(pos.lon, 20.0, epsilon = 1e-4);

        // raster (2.5, 2.5) is grid sample (1, 1)
        let pos = gc.geo_pos(PixelPos::new(2.5, 2.5)).expect("invalid");
        assert_abs_diff_eq!(pos.lat, 39.5, epsilon = 1e-4);
        assert_abs_diff_eq!(pos.lon, 20.5, epsilon = 1e-4);
    }

    #[test]
    fn test_forward_interpolates_between_grid_samples() {
        let (lat_grid, lon_grid) = grids(false);
        let gc = SwathTiePointGeoCoding::new(lat_grid, lon_grid, 4, 16, 16).unwrap();

        // halfway between grid columns 0 and 1 on the first grid row
        let pos = gc.geo_pos(PixelPos::new(1.5, 0.5)).expect("invalid");
        assert_abs_diff_eq!(pos.lon, 20.25, epsilon = 1e-4);
        assert_abs_diff_eq!(pos.lat, 40.0, epsilon = 1e-4);
    }

    #[test]
    fn test_forward_outside_scene() {
        let (lat_grid, lon_grid) = grids(false);
        let gc = SwathTiePointGeoCoding::new(lat_grid, lon_grid, 4, 16, 16).unwrap();

        assert!(gc.geo_pos(PixelPos::new(-1.0, 2.0)).is_none());
        assert!(gc.geo_pos(PixelPos::new(2.0, 16.5)).is_none());
    }

    #[test]
    fn test_inverse_maps_through_subsampling() {
        let (lat_grid, lon_grid) = grids(false);
        let gc = SwathTiePointGeoCoding::new(lat_grid, lon_grid, 4, 16, 16).unwrap();

        // grid sample (1, 1) -> raster (2.5, 2.5)
        let pix = gc.pixel_pos(GeoPos::new(39.5, 20.5)).expect("not found");
        assert_abs_diff_eq!(pix.x, 2.5, epsilon = 1e-4);
        assert_abs_diff_eq!(pix.y, 2.5, epsilon = 1e-4);
    }

    #[test]
    fn test_inverse_outside_swath() {
        let (lat_grid, lon_grid) = grids(false);
        let gc = SwathTiePointGeoCoding::new(lat_grid, lon_grid, 4, 16, 16).unwrap();

        assert!(gc.pixel_pos(GeoPos::new(0.0, 20.0)).is_none());
        assert!(gc.pixel_pos(GeoPos::new(40.0, -60.0)).is_none());
    }

    #[test]
    fn test_antimeridian_flag() {
        let (lat_grid, lon_grid) = grids(true);
        let gc = SwathTiePointGeoCoding::new(lat_grid, lon_grid, 4, 16, 16).unwrap();
        assert!(gc.crosses_antimeridian());

        let (lat_grid, lon_grid) = grids(false);
        let gc = SwathTiePointGeoCoding::new(lat_grid, lon_grid, 4, 16, 16).unwrap();
        assert!(!gc.crosses_antimeridian());
    }
}
