//! Geographic points, distances, and the blocking grid.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meters spanned by one degree of latitude on the mean sphere.
const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// A WGS84 latitude/longitude pair in decimal degrees.
///
/// Construction rejects non-finite values and coordinates outside the globe.
/// Membership in the configured registry envelope is checked separately by
/// [`GeoBounds::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    /// Creates a point, or `None` if either coordinate is not a real position.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }
        Some(Self { lat, lng })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Great-circle distance in meters (haversine).
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let d_phi = (other.lat - self.lat).to_radians();
        let d_lambda = (other.lng - self.lng).to_radians();

        let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();
        EARTH_RADIUS_M * c
    }

    /// Returns the point displaced by the given meters north and east.
    ///
    /// Uses a local equirectangular approximation, accurate to well under a
    /// meter at building scale.
    #[must_use]
    pub fn offset_m(&self, north_m: f64, east_m: f64) -> Self {
        let lat = self.lat + north_m / METERS_PER_DEGREE;
        let lng = self.lng + east_m / (METERS_PER_DEGREE * self.lat.to_radians().cos());
        Self { lat, lng }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Inclusive geographic envelope that valid locations must fall within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoBounds {
    /// Southern edge, degrees.
    pub min_lat: f64,
    /// Northern edge, degrees.
    pub max_lat: f64,
    /// Western edge, degrees.
    pub min_lng: f64,
    /// Eastern edge, degrees.
    pub max_lng: f64,
}

impl GeoBounds {
    /// Returns true if the point lies inside the envelope (edges included).
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat) && (self.min_lng..=self.max_lng).contains(&point.lng)
    }

    /// Envelope latitude farthest from the equator, where a degree of
    /// longitude is shortest.
    #[must_use]
    pub fn poleward_lat(&self) -> f64 {
        self.min_lat.abs().max(self.max_lat.abs())
    }
}

impl Default for GeoBounds {
    /// New York City envelope.
    fn default() -> Self {
        Self {
            min_lat: 40.4,
            max_lat: 41.0,
            min_lng: -74.3,
            max_lng: -73.7,
        }
    }
}

/// Integer coordinates of one blocking grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridCell {
    /// Cells north of the envelope's southern edge.
    pub row: i64,
    /// Cells east of the envelope's western edge.
    pub col: i64,
}

impl GridCell {
    /// The cell itself and its eight immediate neighbors, in row-major order.
    #[must_use]
    pub fn neighborhood(&self) -> [Self; 9] {
        let mut out = [*self; 9];
        let mut i = 0;
        for dr in -1..=1 {
            for dc in -1..=1 {
                out[i] = Self {
                    row: self.row + dr,
                    col: self.col + dc,
                };
                i += 1;
            }
        }
        out
    }
}

/// Fixed-size grid over the registry envelope.
///
/// Cells are at least `cell_m` wide everywhere inside the envelope: the
/// longitude step is sized at the poleward edge, so cells elsewhere are
/// wider east-west than north-south. Anchoring
/// at the envelope's south-west corner keeps cell numbering stable for a
/// given configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    origin_lat: f64,
    origin_lng: f64,
    cell_lat_deg: f64,
    cell_lng_deg: f64,
}

impl Grid {
    /// Builds a grid with the given cell edge in meters.
    #[must_use]
    pub fn new(bounds: &GeoBounds, cell_m: f64) -> Self {
        let cell_lat_deg = cell_m / METERS_PER_DEGREE;
        let shrink = bounds.poleward_lat().to_radians().cos().max(f64::EPSILON);
        let cell_lng_deg = cell_m / (METERS_PER_DEGREE * shrink);
        Self {
            origin_lat: bounds.min_lat,
            origin_lng: bounds.min_lng,
            cell_lat_deg,
            cell_lng_deg,
        }
    }

    /// Cell containing the point.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell_of(&self, point: &GeoPoint) -> GridCell {
        GridCell {
            row: ((point.lat - self.origin_lat) / self.cell_lat_deg).floor() as i64,
            col: ((point.lng - self.origin_lng) / self.cell_lng_deg).floor() as i64,
        }
    }
}
