// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Geographic and planar helpers.
//!
//! Positions and angles are in degrees, distances and altitudes in meters.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Mean earth radius of the sphere all exact formulas are based on.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Length of one degree of latitude on that sphere.
pub const LAT_DEG_IN_M: f64 = EARTH_RADIUS_M * PI / 180.0;
pub const M_PER_FT: f64 = 0.3048;
pub const M_PER_NM: f64 = 1852.0;
pub const KT_PER_M_PER_S: f64 = 3600.0 / M_PER_NM;
/// Feet per minute expressed in meters per second.
pub const M_S_PER_FT_MIN: f64 = M_PER_FT / 60.0;

/// Length of one degree of longitude at the given latitude.
pub fn lon_deg_in_m(lat: f64) -> f64 {
    LAT_DEG_IN_M * lat.to_radians().cos()
}

/// Initial bearing from point 1 to point 2, normalized to `[0, 360)`.
pub fn angle_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let x = delta_lon.sin() * lat2_rad.cos();
    let y = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    heading_normalize(x.atan2(y).to_degrees())
}

/// Great-circle distance in meters (haversine).
pub fn distance_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Cheap planar estimate of the *squared* distance between two nearby points.
///
/// Only valid for short distances (a few kilometers). Below 10m it agrees
/// with [`distance_between`] to within millimeters.
pub fn estimated_distance_sqr(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dy = (lat2 - lat1) * LAT_DEG_IN_M;
    let dx = (lon2 - lon1) * lon_deg_in_m((lat1 + lat2) / 2.0);
    dx * dx + dy * dy
}

/// Square root of [`estimated_distance_sqr`].
pub fn estimated_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    estimated_distance_sqr(lat1, lon1, lat2, lon2).sqrt()
}

/// Point reached when travelling `dist_m` from the start along `heading`.
/// A negative distance travels the opposite way.
pub fn destination(lat: f64, lon: f64, heading: f64, dist_m: f64) -> (f64, f64) {
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let brg = heading.to_radians();
    let ang = dist_m / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * ang.cos() + lat1.cos() * ang.sin() * brg.cos()).asin();
    let lon2 = lon1
        + (brg.sin() * ang.sin() * lat1.cos()).atan2(ang.cos() - lat1.sin() * lat2.sin());

    let mut lon2 = lon2.to_degrees();
    if lon2 >= 180.0 {
        lon2 -= 360.0;
    } else if lon2 < -180.0 {
        lon2 += 360.0;
    }
    (lat2.to_degrees(), lon2)
}

/// Normalizes a heading to `[0, 360)`.
pub fn heading_normalize(h: f64) -> f64 {
    let mut h = h % 360.0;
    if h < 0.0 {
        h += 360.0;
    }
    // tiny negative inputs round up to exactly 360
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// Number of degrees to turn from `h1` to reach `h2`, in `[-180, 180]`.
pub fn heading_difference(h1: f64, h2: f64) -> f64 {
    let d = heading_normalize(h2) - heading_normalize(h1);
    if d > 180.0 {
        d - 360.0
    } else if d < -180.0 {
        d + 360.0
    } else {
        d
    }
}

/// Folds a heading into the `[0, 180)` bucket used by the edge index.
///
/// The flag is `true` if the heading had to be turned around by 180°,
/// i.e. the direction of travel is the reverse sense of a matching edge.
pub fn fold_heading(h: f64) -> (f64, bool) {
    let h = heading_normalize(h);
    if h >= 180.0 {
        (h - 180.0, true)
    } else {
        (h, false)
    }
}

/// Squared results of [`point_to_segment_sqr`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentDistance {
    /// Squared distance of the point to the finite segment.
    pub dist_sqr: f64,
    /// Squared length of the segment.
    pub len_sqr: f64,
    /// Squared distance from the first endpoint to the base point.
    pub leg1_sqr: f64,
    /// Squared distance from the second endpoint to the base point.
    pub leg2_sqr: f64,
}

impl SegmentDistance {
    /// Does the base point on the infinite line fall outside the segment?
    pub fn is_base_outside(&self) -> bool {
        self.leg1_sqr > self.len_sqr || self.leg2_sqr > self.len_sqr
    }

    /// Squared distance between the base point and the nearer segment end,
    /// zero if the base lies on the segment.
    pub fn beyond_segment_sqr(&self) -> f64 {
        if self.is_base_outside() {
            self.leg1_sqr.min(self.leg2_sqr)
        } else {
            0.0
        }
    }
}

/// Squared distance between point `p` and segment `a`-`b`.
///
/// Makes no assumption about the coordinate system other than `x` and `y`
/// being orthogonal. In local coordinates the results are square meters.
pub fn point_to_segment_sqr(
    px: f64,
    py: f64,
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
) -> SegmentDistance {
    let (dx, dy) = (bx - ax, by - ay);
    let len_sqr = dx * dx + dy * dy;
    let pa_sqr = (px - ax).powi(2) + (py - ay).powi(2);

    if len_sqr <= 0.0 {
        return SegmentDistance {
            dist_sqr: pa_sqr,
            len_sqr: 0.0,
            leg1_sqr: 0.0,
            leg2_sqr: 0.0,
        };
    }

    let t = ((px - ax) * dx + (py - ay) * dy) / len_sqr;
    let (base_x, base_y) = (ax + t * dx, ay + t * dy);
    let perp_sqr = (px - base_x).powi(2) + (py - base_y).powi(2);

    let dist_sqr = if t < 0.0 {
        pa_sqr
    } else if t > 1.0 {
        (px - bx).powi(2) + (py - by).powi(2)
    } else {
        perp_sqr
    };

    SegmentDistance {
        dist_sqr,
        len_sqr,
        leg1_sqr: t * t * len_sqr,
        leg2_sqr: (1.0 - t) * (1.0 - t) * len_sqr,
    }
}

/// Location of the base point on the (unclamped) line `a`-`b`,
/// given the result of [`point_to_segment_sqr`] for the same line.
pub fn base_location_on_line(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    res: &SegmentDistance,
) -> (f64, f64) {
    if res.len_sqr <= 0.0 {
        return (ax, ay);
    }
    let mut t = (res.leg1_sqr / res.len_sqr).sqrt();
    // base before `a`: farther from `b` than the segment is long, and closer to `a`
    if res.leg2_sqr > res.len_sqr && res.leg2_sqr > res.leg1_sqr {
        t = -t;
    }
    (ax + t * (bx - ax), ay + t * (by - ay))
}

/// Special flight phases a synthesized position can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlightPhase {
    #[default]
    Unknown,
    Taxi,
    TouchDown,
}

/// A position with optional attitude and timestamp.
///
/// Unknown values are NaN, mirroring the sim's own data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
    /// Seconds, in whatever epoch the caller uses
    pub ts: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub on_ground: bool,
    pub phase: FlightPhase,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            alt_m: f64::NAN,
            ts: f64::NAN,
            heading: f64::NAN,
            pitch: f64::NAN,
            roll: f64::NAN,
            on_ground: false,
            phase: FlightPhase::Unknown,
        }
    }

    pub fn with_alt_m(mut self, alt_m: f64) -> Self {
        self.alt_m = alt_m;
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_ts(mut self, ts: f64) -> Self {
        self.ts = ts;
        self
    }

    /// Valid geographic location?
    pub fn is_normal(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..180.0).contains(&self.lon)
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        distance_between(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn angle_to(&self, other: &Position) -> f64 {
        angle_between(self.lat, self.lon, other.lat, other.lon)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.5}, {:.5}) {:.0}m {:.0}°",
            self.lat, self.lon, self.alt_m, self.heading
        )
    }
}

/// A lat/lon box spanned by its north-west and south-east corners.
///
/// The default box is empty (all NaN) and contains nothing until enlarged.
/// A box crossing the antimeridian has `min_lon > max_lon`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min_lat: f64::NAN,
            max_lat: f64::NAN,
            min_lon: f64::NAN,
            max_lon: f64::NAN,
        }
    }
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Box of `width_m` × `height_m` centered on the given point.
    pub fn around(lat: f64, lon: f64, width_m: f64, height_m: f64) -> Self {
        let mut bx = Self::new(lat, lat, lon, lon);
        bx.enlarge_m(width_m / 2.0, height_m / 2.0);
        bx
    }

    pub fn is_empty(&self) -> bool {
        self.min_lat.is_nan() || self.max_lat.is_nan() || self.min_lon.is_nan() || self.max_lon.is_nan()
    }

    /// North-west corner as `(lat, lon)`.
    pub fn nw(&self) -> (f64, f64) {
        (self.max_lat, self.min_lon)
    }

    /// South-east corner as `(lat, lon)`.
    pub fn se(&self) -> (f64, f64) {
        (self.min_lat, self.max_lon)
    }

    /// Whether the box crosses the antimeridian.
    pub fn wraps(&self) -> bool {
        self.min_lon > self.max_lon
    }

    pub fn center(&self) -> (f64, f64) {
        let lat = (self.min_lat + self.max_lat) / 2.0;
        if !self.wraps() {
            return (lat, (self.min_lon + self.max_lon) / 2.0);
        }
        let lon = (self.min_lon + self.max_lon + 360.0) / 2.0;
        (lat, if lon >= 180.0 { lon - 360.0 } else { lon })
    }

    /// Longitude ranges covered, two of them if the box wraps.
    fn lon_ranges(&self) -> [(f64, f64); 2] {
        if self.wraps() {
            [(self.min_lon, 180.0), (-180.0, self.max_lon)]
        } else {
            [(self.min_lon, self.max_lon); 2]
        }
    }

    /// Grows the box so that it includes the given point. Longitudes are taken as they are.
    pub fn enlarge_pos(&mut self, lat: f64, lon: f64) {
        if self.is_empty() {
            *self = Self::new(lat, lat, lon, lon);
            return;
        }
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    /// Grows the box by `x_m` east/west and `y_m` north/south on each side.
    pub fn enlarge_m(&mut self, x_m: f64, y_m: f64) {
        if self.is_empty() {
            return;
        }
        let dlat = y_m / LAT_DEG_IN_M;
        self.min_lat = (self.min_lat - dlat).max(-90.0);
        self.max_lat = (self.max_lat + dlat).min(90.0);

        // a degree of longitude is shortest at the box's poleward edge
        let lat_far = self.min_lat.abs().max(self.max_lat.abs()).min(89.9);
        let dlon = x_m / lon_deg_in_m(lat_far);
        let span = if self.wraps() {
            self.max_lon - self.min_lon + 360.0
        } else {
            self.max_lon - self.min_lon
        };
        if span + 2.0 * dlon >= 360.0 {
            self.min_lon = -180.0;
            self.max_lon = 180.0;
            return;
        }
        self.min_lon -= dlon;
        if self.min_lon < -180.0 {
            self.min_lon += 360.0;
        }
        self.max_lon += dlon;
        if self.max_lon > 180.0 {
            self.max_lon -= 360.0;
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat
            && lat <= self.max_lat
            && self
                .lon_ranges()
                .iter()
                .any(|&(w, e)| lon >= w && lon <= e)
    }

    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        if !(self.min_lat <= other.max_lat && other.min_lat <= self.max_lat) {
            return false;
        }
        self.lon_ranges().iter().any(|&(w1, e1)| {
            other
                .lon_ranges()
                .iter()
                .any(|&(w2, e2)| w1 <= e2 && w2 <= e1)
        })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, w) = self.nw();
        let (s, e) = self.se();
        write!(f, "({:.4}, {:.4}) - ({:.4}, {:.4})", n, w, s, e)
    }
}
