use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geodetic snapshot of the vehicle (or of home).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub heading: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64, alt: f64, heading: f64) -> Self {
        Self { lat, lon, alt, heading }
    }

    /// Great-circle distance in metres, ignoring altitude.
    pub fn distance_to(&self, other: &Location) -> f64 {
        haversine_m(self.lat, self.lon, other.lat, other.lon)
    }

    /// Point displaced by a small local north/east offset (equirectangular).
    pub fn offset(&self, north_m: f64, east_m: f64) -> Location {
        let dlat = (north_m / EARTH_RADIUS_M).to_degrees();
        let dlon = (east_m / (EARTH_RADIUS_M * self.lat.to_radians().cos())).to_degrees();
        Location { lat: self.lat + dlat, lon: self.lon + dlon, ..*self }
    }

    /// Parses the simulator home form `lat,lon,alt,heading`.
    pub fn parse(s: &str) -> Option<Location> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [lat, lon, alt, heading] => Some(Location::new(*lat, *lon, *alt, *heading)),
            _ => None,
        }
    }

    /// `--home` argument for the simulator binary.
    pub fn to_home_arg(&self) -> String {
        format!("{:.6},{:.6},{},{}", self.lat, self.lon, self.alt.max(0.0) as u32, self.heading.max(0.0) as u32)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.abs() <= 90.0 && self.lon.abs() <= 180.0 && self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Absolute heading difference in degrees, in `[0, 180]`, wrapping at 0/360.
pub fn heading_error(target: f64, observed: f64) -> f64 {
    let d = (observed - target).rem_euclid(360.0);
    if d > 180.0 { 360.0 - d } else { d }
}

fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> Location {
        Location::new(-35.362938, 149.165085, 584.0, 270.0)
    }

    #[test]
    fn heading_wraps_at_north() {
        assert!((heading_error(0.0, 359.0) - 1.0).abs() < 1e-9);
        assert!((heading_error(359.0, 0.0) - 1.0).abs() < 1e-9);
        assert!((heading_error(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((heading_error(90.0, 270.0) - 180.0).abs() < 1e-9);
        assert_eq!(heading_error(170.0, 170.0), 0.0);
    }

    #[test]
    fn offset_distance_matches() {
        let h = home();
        let north = h.offset(50.0, 0.0);
        assert!((h.distance_to(&north) - 50.0).abs() < 0.05);
        let diag = h.offset(30.0, 40.0);
        assert!((h.distance_to(&diag) - 50.0).abs() < 0.1);
    }

    #[test]
    fn home_arg_round_trips() {
        let h = home();
        assert_eq!(h.to_home_arg(), "-35.362938,149.165085,584,270");
        let back = Location::parse(&h.to_home_arg()).unwrap();
        assert!(back.distance_to(&h) < 0.01);
        assert!(Location::parse("1,2,3").is_none());
        assert!(Location::parse("a,b,c,d").is_none());
    }
}
