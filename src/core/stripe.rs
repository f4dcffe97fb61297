use crate::core::scan::StripeGeoCoding;
use crate::types::{GeoError, GeoPos, GeoResult, GeoSamples};
use ndarray::{s, Array2};

const D2R: f32 = std::f32::consts::PI / 180.0;

/// One scan's worth of geocoded rows plus its center line
pub struct Stripe {
    pub geocoding: StripeGeoCoding,
    pub center_line: CenterLine,
}

/// Polyline approximating the geographic center of a stripe, used to order
/// candidate stripes during inverse lookup. Purely a performance pre-filter,
/// never a correctness gate.
pub struct CenterLine {
    points: Vec<GeoPos>,
}

impl CenterLine {
    fn from_geocoding(geocoding: &StripeGeoCoding) -> Self {
        let width = geocoding.width();
        let center_y = geocoding.height() as f32 / 2.0;
        let step = (width / 50).max(1);

        let mut points = Vec::new();
        let mut x = 0;
        while x < width {
            if let Some(pos) = geocoding.geo_pos(x as f32 + 0.5, center_y) {
                points.push(pos);
            }
            x += step;
        }
        Self { points }
    }

    /// Squared geographic distance from (lat, lon) to the nearest polyline
    /// vertex, with the usual latitude-cosine longitude correction
    pub fn squared_distance(&self, lat: f32, lon: f32) -> f32 {
        let f = (lat * D2R).cos();
        self.points
            .iter()
            .map(|p| {
                let mut dlon = lon - p.lon;
                if dlon > 180.0 {
                    dlon -= 360.0;
                } else if dlon < -180.0 {
                    dlon += 360.0;
                }
                let dlat = lat - p.lat;
                dlat * dlat + (f * dlon) * (f * dlon)
            })
            .fold(f32::MAX, f32::min)
    }
}

/// The full swath partitioned into fixed-height stripes
pub struct SwathStripes {
    pub stripes: Vec<Option<Stripe>>,
    pub scan_height: usize,
    pub scanline_offset: usize,
    /// Index range of non-degenerate stripes, `None` if every stripe is
    /// degenerate
    pub valid_range: Option<(usize, usize)>,
    pub crosses_antimeridian: bool,
}

/// Partitions a swath's latitude/longitude sample arrays into fixed-height
/// stripes covering the whole scene.
///
/// When the physical scan pattern does not line up with the tiling grid, the
/// leading partial stripe is completed by backward linear extrapolation and
/// the trailing one by forward extrapolation, so every stripe has exactly
/// `scan_height` rows.
pub struct StripeBuilder<'a> {
    lats: &'a GeoSamples,
    lons: &'a GeoSamples,
    scan_height: usize,
}

impl<'a> StripeBuilder<'a> {
    pub fn new(lats: &'a GeoSamples, lons: &'a GeoSamples, scan_height: usize) -> GeoResult<Self> {
        if scan_height < 2 {
            return Err(GeoError::InvalidScanHeight(scan_height));
        }
        if lats.dim() != lons.dim() {
            return Err(GeoError::ShapeMismatch {
                lat: lats.dim(),
                lon: lons.dim(),
            });
        }
        let (height, width) = lats.dim();
        if width == 0 || height == 0 {
            return Err(GeoError::EmptySwath);
        }
        Ok(Self {
            lats,
            lons,
            scan_height,
        })
    }

    pub fn build(&self) -> GeoResult<SwathStripes> {
        let (scene_height, _) = self.lats.dim();
        let scan_height = self.scan_height;

        let scanline_offset = self.compute_scanline_offset();
        log::debug!(
            "scanline offset {} for scan height {}",
            scanline_offset,
            scan_height
        );

        let mut stripes = Vec::new();

        let first_y = if scanline_offset != 0 {
            let first_y = scan_height - scanline_offset;
            let lats = self.extrapolate_leading(self.lats, scanline_offset, first_y);
            let lons = self.extrapolate_leading(self.lons, scanline_offset, first_y);
            stripes.push(make_stripe(lats, lons));
            first_y
        } else {
            0
        };

        let mut y = first_y;
        while y + scan_height <= scene_height {
            let lats = self.lats.slice(s![y..y + scan_height, ..]).to_owned();
            let lons = self.lons.slice(s![y..y + scan_height, ..]).to_owned();
            stripes.push(make_stripe(lats, lons));
            y += scan_height;
        }

        if y < scene_height {
            let last_h = scene_height - y;
            let lats = self.extrapolate_trailing(self.lats, y, last_h);
            let lons = self.extrapolate_trailing(self.lons, y, last_h);
            stripes.push(make_stripe(lats, lons));
        }

        let first_valid = stripes.iter().position(|s| s.is_some());
        let last_valid = stripes.iter().rposition(|s| s.is_some());
        let valid_range = first_valid.zip(last_valid);

        let crosses_antimeridian = stripes
            .iter()
            .flatten()
            .any(|s| s.geocoding.crosses_meridian());

        log::info!(
            "built {} stripes ({} valid), scanline offset {}, antimeridian {}",
            stripes.len(),
            stripes.iter().flatten().count(),
            scanline_offset,
            crosses_antimeridian
        );

        Ok(SwathStripes {
            stripes,
            scan_height,
            scanline_offset,
            valid_range,
            crosses_antimeridian,
        })
    }

    /// Walk a latitude column top to bottom and find where the latitude
    /// overlaps the previous line, marking the start of a new physical scan
    /// within the tiling grid. Column 0 first, the last column as fallback.
    fn compute_scanline_offset(&self) -> usize {
        let (height, width) = self.lats.dim();

        let find_start = |x: usize| {
            (1..height).find(|&y| self.lats[[y - 1, x]] < self.lats[[y, x]])
        };

        let start = find_start(0).or_else(|| find_start(width - 1));
        match start {
            None => 0,
            Some(start) => {
                let start = start % self.scan_height;
                if start == 0 {
                    0
                } else {
                    self.scan_height - start
                }
            }
        }
    }

    /// Complete the first partial scan by extrapolating `offset` rows
    /// backward above the swath, per column, from the delta of the first
    /// full scan below it
    fn extrapolate_leading(&self, values: &GeoSamples, offset: usize, first_y: usize) -> GeoSamples {
        let (scene_height, width) = values.dim();
        let scan_height = self.scan_height;
        let mut block = Array2::zeros((scan_height, width));

        block
            .slice_mut(s![offset.., ..])
            .assign(&values.slice(s![..first_y, ..]));

        for x in 0..width {
            let delta = if first_y + scan_height <= scene_height {
                // delta per line of the first full scan below
                let y1 = first_y;
                let y2 = y1 + scan_height - 1;
                (values[[y2, x]] - values[[y1, x]]) / (scan_height - 1) as f32
            } else if scene_height >= 2 {
                // no full scan exists, fall back to the first adjacent rows
                values[[1, x]] - values[[0, x]]
            } else {
                0.0
            };
            let reference = values[[0, x]];
            for y in 0..offset {
                block[[y, x]] = reference - delta * (offset - y) as f32;
            }
        }
        block
    }

    /// Complete the last partial scan by extrapolating forward below the
    /// swath, per column, from the delta of the last full scan above it
    fn extrapolate_trailing(&self, values: &GeoSamples, stripe_y: usize, last_h: usize) -> GeoSamples {
        let (scene_height, width) = values.dim();
        let scan_height = self.scan_height;
        let mut block = Array2::zeros((scan_height, width));

        block
            .slice_mut(s![..last_h, ..])
            .assign(&values.slice(s![stripe_y.., ..]));

        for x in 0..width {
            let delta = if stripe_y >= scan_height {
                let y1 = stripe_y - scan_height;
                let y2 = stripe_y - 1;
                (values[[y2, x]] - values[[y1, x]]) / (scan_height - 1) as f32
            } else if scene_height >= 2 {
                values[[scene_height - 1, x]] - values[[scene_height - 2, x]]
            } else {
                0.0
            };
            let reference = values[[scene_height - 1, x]];
            for y in last_h..scan_height {
                block[[y, x]] = reference + delta * (y - last_h + 1) as f32;
            }
        }
        block
    }
}

/// Build one stripe, or record it as degenerate when its latitude block
/// contains no usable data (minimum below -90 means sentinel fill)
fn make_stripe(lats: GeoSamples, lons: GeoSamples) -> Option<Stripe> {
    let lat_min = lats.iter().cloned().fold(f32::MAX, f32::min);
    if lat_min < -90.0 {
        return None;
    }
    let geocoding = StripeGeoCoding::new(lats, lons);
    let center_line = CenterLine::from_geocoding(&geocoding);
    Some(Stripe {
        geocoding,
        center_line,
    })
}
