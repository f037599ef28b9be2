//! Great-circle navigation math between the current fix and stored points.
//!
//! Everything works in `f64` degrees on a spherical earth. `libm` provides
//! the trigonometry so the same code runs on target and on the host.

use core::f64::consts::PI;
use core::fmt::Write;

use heapless::String;
use libm::{atan2, cos, fabs, sin, sqrt};

/// Mean earth radius used for distances (m).
pub const EARTH_RADIUS_M: f64 = 6_372_795.0;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// A validated geographic position in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting NaN and out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if Self::in_range(latitude, longitude) {
            Some(Self {
                latitude,
                longitude,
            })
        } else {
            None
        }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180].
    pub fn in_range(latitude: f64, longitude: f64) -> bool {
        (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
    }
}

/// Initial great-circle bearing from `from` to `to`, in [0, 360).
pub fn bearing_to(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.latitude * DEG_TO_RAD;
    let lat2 = to.latitude * DEG_TO_RAD;
    let dlon = (to.longitude - from.longitude) * DEG_TO_RAD;

    let y = sin(dlon) * cos(lat2);
    let x = cos(lat1) * sin(lat2) - sin(lat1) * cos(lat2) * cos(dlon);

    let mut theta = atan2(y, x);
    if theta < 0.0 {
        theta += 2.0 * PI;
    }

    let degrees = theta * RAD_TO_DEG;
    // -0.0 + 2π can round up to exactly 360.
    if degrees >= 360.0 {
        degrees - 360.0
    } else {
        degrees
    }
}

/// Great-circle (haversine) distance in metres. Symmetric and non-negative.
pub fn distance_to(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let half_dlat = fabs(to.latitude - from.latitude) * DEG_TO_RAD / 2.0;
    let half_dlon = fabs(to.longitude - from.longitude) * DEG_TO_RAD / 2.0;

    let s_lat = sin(half_dlat);
    let s_lon = sin(half_dlon);
    let a = s_lat * s_lat
        + cos(from.latitude * DEG_TO_RAD) * cos(to.latitude * DEG_TO_RAD) * s_lon * s_lon;
    // Rounding can push `a` a hair past 1 for antipodal points.
    let a = a.clamp(0.0, 1.0);

    2.0 * atan2(sqrt(a), sqrt(1.0 - a)) * EARTH_RADIUS_M
}

/// Target bearing relative to the current heading, in (-180, 180].
///
/// Both inputs are expected in [0, 360), so one adjustment suffices.
pub fn relative_bearing(target_bearing: f64, heading: f64) -> f64 {
    let relative = target_bearing - heading;
    if relative > 180.0 {
        relative - 360.0
    } else if relative <= -180.0 {
        relative + 360.0
    } else {
        relative
    }
}

/// Offset of a marker on a compass ring of `radius` px for a relative
/// bearing, with 0° straight up and screen y growing downwards.
pub fn marker_offset(relative_bearing_deg: f64, radius: f64) -> (i32, i32) {
    let theta = relative_bearing_deg * DEG_TO_RAD;
    ((radius * sin(theta)) as i32, (-radius * cos(theta)) as i32)
}

/// Render a distance in kilometres with the display precision policy:
/// no decimals above 10 km, one above 1 km, two otherwise.
pub fn format_distance_km(km: f64) -> String<16> {
    let mut out = String::new();
    let _ = if km > 10.0 {
        write!(out, "{:.0}", km)
    } else if km > 1.0 {
        write!(out, "{:.1}", km)
    } else {
        write!(out, "{:.2}", km)
    };
    out
}
