use crate::types::{GeoPos, GeoSamples};

/// Bounding box tolerance in degrees, absorbs sample jitter at quad edges
const EPS: f32 = 0.04;

const D2R: f32 = std::f32::consts::PI / 180.0;

/// Best candidate found so far during the window recursion
#[derive(Debug, Clone, Copy)]
struct Nearest {
    x: usize,
    y: usize,
    delta: f32,
}

impl Nearest {
    fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            delta: f32::MAX,
        }
    }

    /// Keeps the smallest squared distance; ties keep the first one found
    fn update(&mut self, x: usize, y: usize, delta: f32) -> bool {
        if delta < self.delta {
            self.x = x;
            self.y = y;
            self.delta = delta;
            true
        } else {
            false
        }
    }
}

/// Nearest-sample search over one stripe's geolocation block.
///
/// Recursively narrows a pixel-index window using bounding-box pruning on
/// the window corners. Longitude boxes are meridian-aware: when the stripe
/// crosses the +/-180 meridian and a window straddles it, the box is cut to
/// the positive or negative longitude sub-range matching the target instead
/// of a naive min/max that would cover the whole globe.
pub struct QuadTreeLocator<'a> {
    lats: &'a GeoSamples,
    lons: &'a GeoSamples,
    width: usize,
    height: usize,
    crosses_meridian: bool,
}

impl<'a> QuadTreeLocator<'a> {
    pub fn new(lats: &'a GeoSamples, lons: &'a GeoSamples, crosses_meridian: bool) -> Self {
        let (height, width) = lats.dim();
        Self {
            lats,
            lons,
            width,
            height,
            crosses_meridian,
        }
    }

    /// Find the valid sample nearest to (lat, lon), or `None` if the search
    /// window never contains the target.
    pub fn locate(&self, lat: f32, lon: f32) -> Option<(usize, usize)> {
        let mut nearest = Nearest::new();
        if self.search(lat, lon, 0, 0, self.width, self.height, &mut nearest) {
            Some((nearest.x, nearest.y))
        } else {
            None
        }
    }

    fn sample(&self, x: usize, y: usize) -> Option<GeoPos> {
        if x < self.width && y < self.height {
            let pos = GeoPos::new(self.lats[[y, x]], self.lons[[y, x]]);
            if pos.is_valid() {
                return Some(pos);
            }
        }
        None
    }

    fn search(
        &self,
        lat: f32,
        lon: f32,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        nearest: &mut Nearest,
    ) -> bool {
        if w < 2 || h < 2 {
            return false;
        }

        let x1 = x;
        let x2 = x + w - 1;
        let y1 = y;
        let y2 = y + h - 1;

        // corner order: TL, BL, TR, BR
        let corners = [
            self.sample(x1, y1),
            self.sample(x1, y2),
            self.sample(x2, y1),
            self.sample(x2, y2),
        ];

        // a fill-valued corner leaves the bounding box undefined; such a
        // window cannot be pruned and is searched regardless, otherwise
        // valid samples behind it would be unreachable
        if corners.iter().all(|c| c.is_some()) {
            let corner_lats = corners.iter().flatten().map(|c| c.lat);
            let lat_min = corner_lats.clone().fold(f32::MAX, f32::min) - EPS;
            let lat_max = corner_lats.fold(f32::MIN, f32::max) + EPS;
            if lat < lat_min || lat > lat_max {
                return false;
            }

            let (lon_min, lon_max) = self.lon_bounds(lon, &corners);
            if lon < lon_min || lon > lon_max {
                return false;
            }
        }

        if w == 2 && h == 2 {
            let f = (lat * D2R).cos();
            let mut found = false;
            let coords = [(x1, y1), (x1, y2), (x2, y1), (x2, y2)];
            for (corner, (cx, cy)) in corners.iter().zip(coords) {
                if let Some(pos) = corner {
                    let delta = sqr(lat - pos.lat, f * delta_lon(lon, pos.lon));
                    if nearest.update(cx, cy, delta) {
                        found = true;
                    }
                }
            }
            found
        } else {
            self.recurse(lat, lon, x, y, w, h, nearest)
        }
    }

    fn recurse(
        &self,
        lat: f32,
        lon: f32,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        nearest: &mut Nearest,
    ) -> bool {
        let mut w2 = w >> 1;
        let mut h2 = h >> 1;
        let x2 = x + w2;
        let y2 = y + h2;
        let w2r = w - w2;
        let h2r = h - h2;

        if w2 < 2 {
            w2 = 2;
        }
        if h2 < 2 {
            h2 = 2;
        }

        // all quadrants are visited; pruning happens inside each call
        let b1 = self.search(lat, lon, x, y, w2, h2, nearest);
        let b2 = self.search(lat, lon, x, y2, w2, h2r, nearest);
        let b3 = self.search(lat, lon, x2, y, w2r, h2, nearest);
        let b4 = self.search(lat, lon, x2, y2, w2r, h2r, nearest);

        b1 || b2 || b3 || b4
    }

    fn lon_bounds(&self, lon: f32, corners: &[Option<GeoPos>; 4]) -> (f32, f32) {
        if self.crosses_meridian && crosses_meridian_inside_quad(corners) {
            if lon >= 0.0 {
                // target is on the positive side, cut negative longitudes from the quad
                (positive_lon_min(corners), 180.0)
            } else {
                // target is on the negative side, cut positive longitudes from the quad
                (-180.0, negative_lon_max(corners))
            }
        } else {
            let lons = corners.iter().flatten().map(|c| c.lon);
            let lon_min = lons.clone().fold(f32::MAX, f32::min) - EPS;
            let lon_max = lons.fold(f32::MIN, f32::max) + EPS;
            (lon_min, lon_max)
        }
    }
}

fn sqr(dx: f32, dy: f32) -> f32 {
    dx * dx + dy * dy
}

/// Longitude difference wrapped into [-180, 180] so that distances near the
/// antimeridian compare the short way around
fn delta_lon(lon_a: f32, lon_b: f32) -> f32 {
    let mut d = lon_a - lon_b;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}

/// The window straddles the antimeridian when its corner longitudes span
/// more than half the globe
fn crosses_meridian_inside_quad(corners: &[Option<GeoPos>; 4]) -> bool {
    let lons = corners.iter().flatten().map(|c| c.lon);
    let lon_min = lons.clone().fold(f32::MAX, f32::min);
    let lon_max = lons.fold(f32::MIN, f32::max);
    (lon_max - lon_min).abs() > 180.0
}

fn positive_lon_min(corners: &[Option<GeoPos>; 4]) -> f32 {
    corners
        .iter()
        .flatten()
        .map(|c| c.lon)
        .filter(|&lon| lon >= 0.0)
        .fold(180.0, f32::min)
}

fn negative_lon_max(corners: &[Option<GeoPos>; 4]) -> f32 {
    corners
        .iter()
        .flatten()
        .map(|c| c.lon)
        .filter(|&lon| lon < 0.0)
        .fold(-180.0, f32::max)
}
