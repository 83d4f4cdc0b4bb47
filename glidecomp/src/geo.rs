//! Great-circle geometry on a spherical earth.
//!
//! Distances are metres, bearings degrees true (0-360, 0=north, 90=east).
//! Accuracy is well within what a GPS fix offers for the short legs a
//! single tick covers.

use thiserror::Error;

use crate::units::normalize_bearing;

/// Mean earth radius in metres (FAI sphere).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors constructing a [`GeoPoint`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("Latitude {0} out of range (-90 to 90)")]
    InvalidLatitude(f64),

    #[error("Longitude {0} out of range (-180 to 180)")]
    InvalidLongitude(f64),
}

/// A position in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a validated point.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if either coordinate is outside its range or not
    /// finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance to `other` using the haversine formula.
    ///
    /// ```
    /// use glidecomp::geo::GeoPoint;
    ///
    /// let a = GeoPoint::new(0.0, 0.0).unwrap();
    /// let b = GeoPoint::new(1.0, 0.0).unwrap();
    /// assert!((a.distance(&b) - 111_195.0).abs() < 1.0);
    /// ```
    pub fn distance(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    /// Initial bearing (forward azimuth) towards `other`.
    pub fn bearing(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let x = d_lon.sin() * lat2.cos();
        let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

        normalize_bearing(x.atan2(y).to_degrees())
    }

    /// The point reached by travelling `distance` metres along `bearing`.
    pub fn project(&self, bearing: f64, distance: f64) -> GeoPoint {
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let brg = bearing.to_radians();
        let angular = distance / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * brg.cos()).asin();
        let lon2 = lon1
            + (brg.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

        let mut longitude = lon2.to_degrees();
        if longitude > 180.0 {
            longitude -= 360.0;
        } else if longitude < -180.0 {
            longitude += 360.0;
        }

        GeoPoint {
            latitude: lat2.to_degrees(),
            longitude,
        }
    }
}
