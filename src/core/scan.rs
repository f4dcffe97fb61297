use crate::core::quadtree::QuadTreeLocator;
use crate::types::{GeoPos, GeoSamples};

/// Coordinate mapper for exactly one stripe's sample block.
///
/// Forward mapping interpolates bilinearly between the four nearest sample
/// centers; inverse mapping delegates to the quad-tree search. Whether the
/// stripe crosses the +/-180 meridian is detected once at construction.
pub struct StripeGeoCoding {
    lats: GeoSamples,
    lons: GeoSamples,
    width: usize,
    height: usize,
    crosses_meridian: bool,
}

impl StripeGeoCoding {
    pub fn new(lats: GeoSamples, lons: GeoSamples) -> Self {
        debug_assert_eq!(lats.dim(), lons.dim());
        let (height, width) = lats.dim();
        let crosses_meridian = detect_meridian_crossing(&lats, &lons);
        Self {
            lats,
            lons,
            width,
            height,
            crosses_meridian,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn crosses_meridian(&self) -> bool {
        self.crosses_meridian
    }

    /// Validity-checked sample read; x/y may come from cell-neighbor
    /// arithmetic and are allowed to be out of range
    fn sample(&self, x: isize, y: isize) -> Option<GeoPos> {
        if x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height {
            let pos = GeoPos::new(
                self.lats[[y as usize, x as usize]],
                self.lons[[y as usize, x as usize]],
            );
            if pos.is_valid() {
                return Some(pos);
            }
        }
        None
    }

    /// Forward mapping at a continuous pixel position within the stripe.
    ///
    /// Locates the 2x2 cell of nearest sample centers and interpolates; any
    /// invalid corner invalidates the result.
    pub fn geo_pos(&self, x: f32, y: f32) -> Option<GeoPos> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let mut x0 = x.floor() as isize;
        let mut y0 = y.floor() as isize;
        if x0 < 0 || x0 as usize >= self.width || y0 < 0 || y0 as usize >= self.height {
            return None;
        }

        // shift to the cell whose sample centers enclose the position
        if x0 > 0 && x - (x0 as f32) < 0.5 || x0 as usize == self.width - 1 {
            x0 -= 1;
        }
        if y0 > 0 && y - (y0 as f32) < 0.5 || y0 as usize == self.height - 1 {
            y0 -= 1;
        }
        let wx = x - (x0 as f32 + 0.5);
        let wy = y - (y0 as f32 + 0.5);

        let d00 = self.sample(x0, y0)?;
        let d10 = self.sample(x0 + 1, y0)?;
        let d01 = self.sample(x0, y0 + 1)?;
        let d11 = self.sample(x0 + 1, y0 + 1)?;

        let lat = interpolate(wx, wy, d00.lat, d10.lat, d01.lat, d11.lat);
        let lon = interpolate_lon(wx, wy, d00.lon, d10.lon, d01.lon, d11.lon);
        Some(GeoPos::new(lat, lon))
    }

    /// Forward mapping at continuous grid coordinates, samples located at
    /// integer positions. Used for tie-point grids where samples are anchor
    /// points rather than pixel centers.
    pub fn geo_pos_grid(&self, gx: f32, gy: f32) -> Option<GeoPos> {
        if !gx.is_finite() || !gy.is_finite() {
            return None;
        }
        if gx < 0.0 || gy < 0.0 {
            return None;
        }
        let mut x0 = gx.floor() as isize;
        let mut y0 = gy.floor() as isize;
        if x0 as usize >= self.width || y0 as usize >= self.height {
            return None;
        }
        if x0 as usize == self.width - 1 && self.width > 1 {
            x0 -= 1;
        }
        if y0 as usize == self.height - 1 && self.height > 1 {
            y0 -= 1;
        }
        let wx = gx - x0 as f32;
        let wy = gy - y0 as f32;

        let d00 = self.sample(x0, y0)?;
        let d10 = self.sample(x0 + 1, y0)?;
        let d01 = self.sample(x0, y0 + 1)?;
        let d11 = self.sample(x0 + 1, y0 + 1)?;

        let lat = interpolate(wx, wy, d00.lat, d10.lat, d01.lat, d11.lat);
        let lon = interpolate_lon(wx, wy, d00.lon, d10.lon, d01.lon, d11.lon);
        Some(GeoPos::new(lat, lon))
    }

    /// Inverse mapping to the nearest sample within this stripe
    pub fn pixel_pos(&self, lat: f32, lon: f32) -> Option<(usize, usize)> {
        QuadTreeLocator::new(&self.lats, &self.lons, self.crosses_meridian).locate(lat, lon)
    }
}

fn interpolate(wx: f32, wy: f32, d00: f32, d10: f32, d01: f32, d11: f32) -> f32 {
    d00 + wx * (d10 - d00) + wy * (d01 - d00) + wx * wy * (d11 - d01 - d10 + d00)
}

/// Bilinear longitude interpolation that never averages raw degree values
/// across the +/-180 discontinuity: when the cell spans more than 180
/// degrees, negative corners are shifted by +360 first and the result is
/// wrapped back.
fn interpolate_lon(wx: f32, wy: f32, d00: f32, d10: f32, d01: f32, d11: f32) -> f32 {
    let corners = [d00, d10, d01, d11];
    let lon_min = corners.iter().cloned().fold(f32::MAX, f32::min);
    let lon_max = corners.iter().cloned().fold(f32::MIN, f32::max);

    if lon_max - lon_min > 180.0 {
        let shift = |lon: f32| if lon < 0.0 { lon + 360.0 } else { lon };
        let mut lon = interpolate(
            wx,
            wy,
            shift(d00),
            shift(d10),
            shift(d01),
            shift(d11),
        );
        if lon > 180.0 {
            lon -= 360.0;
        }
        lon
    } else {
        interpolate(wx, wy, d00, d10, d01, d11)
    }
}

/// Scan each row from both ends inward for the first valid sample; a left
/// longitude greater than the right one means the stripe wraps through the
/// +/-180 meridian. Rows lacking a valid sample on either side carry no
/// evidence and are skipped.
fn detect_meridian_crossing(lats: &GeoSamples, lons: &GeoSamples) -> bool {
    let (height, width) = lats.dim();
    for y in 0..height {
        let left = (0..width / 2)
            .map(|x| GeoPos::new(lats[[y, x]], lons[[y, x]]))
            .find(|pos| pos.is_valid());
        let left = match left {
            Some(pos) => pos,
            None => continue,
        };
        let right = (width / 2 + 1..width)
            .rev()
            .map(|x| GeoPos::new(lats[[y, x]], lons[[y, x]]))
            .find(|pos| pos.is_valid());
        let right = match right {
            Some(pos) => pos,
            None => continue,
        };
        if left.lon > right.lon {
            return true;
        }
    }
    false
}
