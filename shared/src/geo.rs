//! Great-circle distance and the fallback travel estimate shown when the
//! routing endpoint has no distance or duration for a report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AppError, ErrorKind};

pub const EARTH_RADIUS_KM: f64 = 6_371.0;
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 35.0;
pub const DEFAULT_DISPATCH_OVERHEAD_MINUTES: f64 = 3.0;

/// Four decimal places is roughly 11 m, fine enough to share geocoder
/// answers between clicks on the same spot.
const GEOCODE_CACHE_PRECISION: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("coordinate is not a finite number")]
    NonFinite,
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }

    #[must_use]
    pub fn distance_km(self, other: Self) -> f64 {
        haversine_km(self, other)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cache_key(self) -> (i64, i64) {
        (
            (self.lat * GEOCODE_CACHE_PRECISION).round() as i64,
            (self.lng * GEOCODE_CACHE_PRECISION).round() as i64,
        )
    }
}

impl TryFrom<(f64, f64)> for Coordinate {
    type Error = CoordinateError;

    fn try_from((lat, lng): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(lat, lng)
    }
}

#[must_use]
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Straight-line travel model: distance at a constant average speed plus a
/// fixed dispatch overhead. Every view shares this one formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtaModel {
    pub average_speed_kmh: f64,
    pub dispatch_overhead_minutes: f64,
}

impl Default for EtaModel {
    fn default() -> Self {
        Self {
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            dispatch_overhead_minutes: DEFAULT_DISPATCH_OVERHEAD_MINUTES,
        }
    }
}

impl EtaModel {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.average_speed_kmh.is_finite()
            && self.average_speed_kmh > 0.0
            && self.dispatch_overhead_minutes.is_finite()
            && self.dispatch_overhead_minutes >= 0.0
    }

    /// Whole minutes, rounded up.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn eta_minutes(&self, distance_km: f64) -> u32 {
        let travel = distance_km.max(0.0) / self.average_speed_kmh * 60.0;
        (travel + self.dispatch_overhead_minutes).ceil() as u32
    }

    #[must_use]
    pub fn estimate(&self, from: Coordinate, to: Coordinate) -> TravelEstimate {
        let distance_km = haversine_km(from, to);
        TravelEstimate {
            distance_km,
            eta_minutes: self.eta_minutes(distance_km),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelEstimate {
    pub distance_km: f64,
    pub eta_minutes: u32,
}

impl TravelEstimate {
    #[must_use]
    pub fn distance_label(&self) -> String {
        format_distance(self.distance_km)
    }

    #[must_use]
    pub fn eta_label(&self) -> String {
        format_eta(self.eta_minutes)
    }
}

#[must_use]
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{:.0} m", (km * 1000.0).max(0.0))
    } else if km < 10.0 {
        format!("{km:.1} km")
    } else {
        format!("{km:.0} km")
    }
}

#[must_use]
pub fn format_eta(minutes: u32) -> String {
    match minutes {
        0 | 1 => "1 min".to_string(),
        m if m < 60 => format!("{m} mins"),
        m => {
            let hours = m / 60;
            let rest = m % 60;
            let hour_label = if hours == 1 { "hr" } else { "hrs" };
            if rest == 0 {
                format!("{hours} {hour_label}")
            } else {
                format!("{hours} {hour_label} {rest} mins")
            }
        }
    }
}

/// Same URL shape the backend hands out from the route endpoint.
#[must_use]
pub fn directions_url(from: Coordinate, to: Coordinate) -> String {
    format!(
        "https://www.google.com/maps/dir/{},{}/{},{}",
        from.lat, from.lng, to.lat, to.lng
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(matches!(
            Coordinate::new(91.0, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            Coordinate::new(0.0, -181.0),
            Err(CoordinateError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            Coordinate::new(f64::NAN, 0.0),
            Err(CoordinateError::NonFinite)
        ));
    }

    #[test]
    fn test_manila_to_quezon_city() {
        let manila = coord(14.5995, 120.9842);
        let quezon = coord(14.6760, 121.0437);
        let d = haversine_km(manila, quezon);
        assert!((d - 10.6).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_antipodal_distance() {
        let d = haversine_km(coord(0.0, 0.0), coord(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_eta_formula() {
        let model = EtaModel::default();
        assert_eq!(model.eta_minutes(0.0), 3);
        // 35 km at 35 km/h is 60 minutes, plus overhead.
        assert_eq!(model.eta_minutes(35.0), 63);
        assert_eq!(model.eta_minutes(1.0), 5);
    }

    #[test]
    fn test_estimate_labels() {
        let estimate = EtaModel::default().estimate(coord(14.5995, 120.9842), coord(14.5995, 120.9842));
        assert_eq!(estimate.distance_label(), "0 m");
        assert_eq!(estimate.eta_label(), "3 mins");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.42), "420 m");
        assert_eq!(format_distance(3.456), "3.5 km");
        assert_eq!(format_distance(27.2), "27 km");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(1), "1 min");
        assert_eq!(format_eta(14), "14 mins");
        assert_eq!(format_eta(60), "1 hr");
        assert_eq!(format_eta(135), "2 hrs 15 mins");
    }

    #[test]
    fn test_directions_url() {
        let url = directions_url(coord(14.5, 121.0), coord(14.6, 121.1));
        assert_eq!(url, "https://www.google.com/maps/dir/14.5,121/14.6,121.1");
    }

    #[test]
    fn test_cache_key_groups_nearby_clicks() {
        assert_eq!(
            coord(14.59951, 120.98421).cache_key(),
            coord(14.59949, 120.98419).cache_key()
        );
        assert_ne!(
            coord(14.5995, 120.9842).cache_key(),
            coord(14.6005, 120.9842).cache_key()
        );
    }

    proptest! {
        #[test]
        fn prop_identical_points_are_zero(lat in -90.0f64..=90.0, lng in -180.0f64..=180.0) {
            let p = coord(lat, lng);
            prop_assert_eq!(haversine_km(p, p), 0.0);
        }

        #[test]
        fn prop_distance_is_symmetric(
            lat1 in -90.0f64..=90.0, lng1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lng2 in -180.0f64..=180.0,
        ) {
            let a = coord(lat1, lng1);
            let b = coord(lat2, lng2);
            prop_assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
        }

        #[test]
        fn prop_eta_never_below_overhead(distance in 0.0f64..500.0) {
            let model = EtaModel::default();
            prop_assert!(model.eta_minutes(distance) >= 3);
        }
    }
}
