//! Geographic rectangles and distances.

use serde::{Deserialize, Serialize};

/// Mean earth radius used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Metres per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Closed rectangle in decimal degrees, as written in index documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// North edge (maximum latitude).
    pub north: f64,
    /// South edge (minimum latitude).
    pub south: f64,
    /// East edge (maximum longitude).
    pub east: f64,
    /// West edge (minimum longitude).
    pub west: f64,
}

impl Bounds {
    pub const fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Check if a coordinate is within the bounds. All four edges are inclusive.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Centre point as `(lat, lon)`.
    pub fn centroid(&self) -> (f64, f64) {
        ((self.north + self.south) / 2.0, (self.east + self.west) / 2.0)
    }

    /// Squared planar distance in degrees from the centroid to a point.
    pub fn centroid_distance_sq(&self, lat: f64, lon: f64) -> f64 {
        let (clat, clon) = self.centroid();
        (clat - lat).powi(2) + (clon - lon).powi(2)
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            north: self.north.max(other.north),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            west: self.west.min(other.west),
        }
    }

    /// Whether the edges are finite and ordered.
    pub fn is_valid(&self) -> bool {
        [self.north, self.south, self.east, self.west]
            .iter()
            .all(|v| v.is_finite())
            && self.north >= self.south
            && self.east >= self.west
    }
}

/// Calculate the distance between two points using the haversine formula.
///
/// Returns the distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains() {
        let bounds = Bounds::new(-30.0, -31.0, -58.0, -59.0);

        assert!(bounds.contains(-30.5, -58.5));
        assert!(bounds.contains(-30.0, -58.0)); // NE corner
        assert!(bounds.contains(-31.0, -59.0)); // SW corner
        assert!(!bounds.contains(-31.5, -58.5)); // Too far south
        assert!(!bounds.contains(-29.5, -58.5)); // Too far north
        assert!(!bounds.contains(-30.5, -57.5)); // Too far east
        assert!(!bounds.contains(-30.5, -59.5)); // Too far west
    }

    #[test]
    fn test_centroid_and_union() {
        let a = Bounds::new(-30.0, -31.0, -58.0, -59.0);
        let b = Bounds::new(-28.0, -30.0, -57.0, -58.0);
        assert_eq!(a.centroid(), (-30.5, -58.5));

        let u = a.union(&b);
        assert_eq!(u, Bounds::new(-28.0, -31.0, -57.0, -59.0));
        assert!(u.is_valid());
        assert!(!Bounds::new(-31.0, -30.0, 0.0, 0.0).is_valid());
    }

    #[test]
    fn test_haversine_distance() {
        // Buenos Aires to Córdoba is approximately 646 km
        let dist = haversine_distance(-34.6037, -58.3816, -31.4201, -64.1888);
        assert!((dist - 646_000.0).abs() < 10_000.0);
        assert_eq!(haversine_distance(1.0, 2.0, 1.0, 2.0), 0.0);
    }
}
