//! Coordinate conversion module
//!
//! Converts between a building's local planar system (meters, origin at the
//! south-west corner, `x` east, `y` north) and WGS84 latitude/longitude using
//! the building's GPS reference. No rotation is applied here.

use serde::{Deserialize, Serialize};

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon")]
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Renderers must skip points that are not finite.
    pub fn is_plottable(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Point in building-local meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPoint {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned rectangle in building-local meters, corners in any order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalBounds {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Rectangle in GPS space, south-west and north-east corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub south_west: LatLon,
    pub north_east: LatLon,
}

/// GPS anchor of the local coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsReference {
    pub origin: LatLon,
    pub scale_lat_m_per_deg: f64,
    pub scale_lon_m_per_deg: f64,
}

impl GpsReference {
    /// `lat = origin.lat + y / scale_lat`, `lon = origin.lon + x / scale_lon`.
    ///
    /// Never fails: a zero or non-finite scale yields non-finite output,
    /// which callers detect with [`LatLon::is_plottable`].
    pub fn to_gps(&self, x: f64, y: f64) -> LatLon {
        LatLon {
            latitude: self.origin.latitude + y / self.scale_lat_m_per_deg,
            longitude: self.origin.longitude + x / self.scale_lon_m_per_deg,
        }
    }

    /// Inverse of [`GpsReference::to_gps`].
    pub fn to_local(&self, point: LatLon) -> LocalPoint {
        LocalPoint {
            x: (point.longitude - self.origin.longitude) * self.scale_lon_m_per_deg,
            y: (point.latitude - self.origin.latitude) * self.scale_lat_m_per_deg,
        }
    }

    /// Converts local bounds, normalizing corner order to SW/NE.
    pub fn bounds_to_gps(&self, bounds: &LocalBounds) -> GeoBounds {
        let south_west = self.to_gps(bounds.x1.min(bounds.x2), bounds.y1.min(bounds.y2));
        let north_east = self.to_gps(bounds.x1.max(bounds.x2), bounds.y1.max(bounds.y2));
        GeoBounds { south_west, north_east }
    }

    /// A reference is usable only with a finite origin and non-zero finite scales.
    pub fn is_valid(&self) -> bool {
        self.origin.is_plottable()
            && self.scale_lat_m_per_deg.is_finite()
            && self.scale_lon_m_per_deg.is_finite()
            && self.scale_lat_m_per_deg != 0.0
            && self.scale_lon_m_per_deg != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warsaw_reference() -> GpsReference {
        GpsReference {
            origin: LatLon::new(52.0, 21.0),
            scale_lat_m_per_deg: 111_000.0,
            scale_lon_m_per_deg: 111_000.0,
        }
    }

    #[test]
    fn test_to_gps_known_point() {
        let gps = warsaw_reference().to_gps(40.0, 25.0);

        assert!((gps.latitude - (52.0 + 25.0 / 111_000.0)).abs() < 1e-12);
        assert!((gps.longitude - (21.0 + 40.0 / 111_000.0)).abs() < 1e-12);
        assert!((gps.latitude - 52.000225).abs() < 1e-6);
        assert!((gps.longitude - 21.000360).abs() < 1e-6);
    }

    #[test]
    fn test_origin_maps_to_reference() {
        let reference = warsaw_reference();
        assert_eq!(reference.to_gps(0.0, 0.0), reference.origin);
    }

    #[test]
    fn test_round_trip_recovers_local_point() {
        let reference = warsaw_reference();
        for &(x, y) in &[(0.0, 0.0), (40.0, 25.0), (-12.5, 3.25), (1000.0, -250.0)] {
            let back = reference.to_local(reference.to_gps(x, y));
            assert!((back.x - x).abs() < 1e-6, "x {} -> {}", x, back.x);
            assert!((back.y - y).abs() < 1e-6, "y {} -> {}", y, back.y);
        }
    }

    #[test]
    fn test_degenerate_reference_is_not_plottable() {
        let reference = GpsReference {
            origin: LatLon::new(f64::NAN, 21.0),
            scale_lat_m_per_deg: 111_000.0,
            scale_lon_m_per_deg: 0.0,
        };

        assert!(!reference.is_valid());
        assert!(!reference.to_gps(10.0, 10.0).is_plottable());
    }

    #[test]
    fn test_bounds_normalized() {
        let reference = warsaw_reference();
        let bounds = LocalBounds { x1: 30.0, y1: 20.0, x2: 10.0, y2: 5.0 };

        let geo = reference.bounds_to_gps(&bounds);

        assert!(geo.south_west.latitude < geo.north_east.latitude);
        assert!(geo.south_west.longitude < geo.north_east.longitude);
        assert_eq!(geo.south_west, reference.to_gps(10.0, 5.0));
    }

    #[test]
    fn test_reference_deserializes_short_keys() {
        let json = r#"{"origin": {"lat": 52.1, "lon": 21.2},
                       "scale_lat_m_per_deg": 111320.0,
                       "scale_lon_m_per_deg": 68400.0}"#;
        let reference: GpsReference = serde_json::from_str(json).unwrap();

        assert_eq!(reference.origin, LatLon::new(52.1, 21.2));
        assert!(reference.is_valid());
    }
}
