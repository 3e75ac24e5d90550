//! Normalized storm and track records shared by every pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Namespace for the v5 identifiers derived from natural keys.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x5f0e_9c1a_7b2d_4c3e_9a81_0d6f_2e4b_7c19);

/// Wind radii per quadrant, ordered NE, SE, SW, NW.
pub type QuadrantRadii = [Option<f64>; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Ibtracs,
    Ecmwf,
    Nhc,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ibtracs => "ibtracs",
            Source::Ecmwf => "ecmwf",
            Source::Nhc => "nhc",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable surrogate key for a storm. Re-ingesting the same `sid` from the same
/// source always yields the same id.
pub fn storm_id(source: Source, sid: &str) -> Uuid {
    Uuid::new_v5(&ID_NAMESPACE, format!("{}:{}", source, sid).as_bytes())
}

fn point_id(natural_key: &str) -> Uuid {
    Uuid::new_v5(&ID_NAMESPACE, natural_key.as_bytes())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Storm {
    pub storm_id: Uuid,
    pub sid: String,
    pub source: Source,
    pub atcf_id: Option<String>,
    pub number: Option<i32>,
    pub season: Option<i32>,
    pub name: Option<String>,
    pub genesis_basin: Option<String>,
    pub provisional: bool,
}

impl Storm {
    pub fn new(source: Source, sid: impl Into<String>) -> Self {
        let sid = sid.into();
        Storm {
            storm_id: storm_id(source, &sid),
            sid,
            source,
            atcf_id: None,
            number: None,
            season: None,
            name: None,
            genesis_basin: None,
            provisional: false,
        }
    }

    pub fn natural_key(&self) -> String {
        format!("{}|{}", self.sid, self.source)
    }
}

/// Fields common to observed, forecast and ensemble track points.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub storm_id: Uuid,
    pub valid_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
    pub gust_speed: Option<f64>,
    pub max_wind_radius: Option<f64>,
    pub last_closed_isobar_radius: Option<f64>,
    pub last_closed_isobar_pressure: Option<f64>,
    pub quadrant_radius_34: Option<QuadrantRadii>,
    pub quadrant_radius_50: Option<QuadrantRadii>,
    pub quadrant_radius_64: Option<QuadrantRadii>,
    pub nature: Option<String>,
    pub basin: Option<String>,
    pub provider: String,
}

impl TrackPoint {
    pub fn new(
        storm_id: Uuid,
        valid_time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        provider: impl Into<String>,
    ) -> Self {
        TrackPoint {
            storm_id,
            valid_time,
            latitude,
            longitude,
            wind_speed: None,
            pressure: None,
            gust_speed: None,
            max_wind_radius: None,
            last_closed_isobar_radius: None,
            last_closed_isobar_pressure: None,
            quadrant_radius_34: None,
            quadrant_radius_50: None,
            quadrant_radius_64: None,
            nature: None,
            basin: None,
            provider: provider.into(),
        }
    }

    /// Well-known-text for the point; x is longitude.
    pub fn wkt(&self) -> String {
        format!("POINT({} {})", self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedTrack {
    pub point_id: Uuid,
    pub point: TrackPoint,
}

impl ObservedTrack {
    pub fn new(point: TrackPoint) -> Self {
        let key = observed_key(&point);
        ObservedTrack {
            point_id: point_id(&key),
            point,
        }
    }

    pub fn natural_key(&self) -> String {
        observed_key(&self.point)
    }
}

fn observed_key(point: &TrackPoint) -> String {
    format!(
        "{}|{}|{}",
        point.storm_id,
        point.valid_time.to_rfc3339(),
        point.provider
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTrack {
    pub point_id: Uuid,
    pub issue_time: DateTime<Utc>,
    pub point: TrackPoint,
}

impl ForecastTrack {
    pub fn new(issue_time: DateTime<Utc>, point: TrackPoint) -> Self {
        let key = forecast_key(&issue_time, &point);
        ForecastTrack {
            point_id: point_id(&key),
            issue_time,
            point,
        }
    }

    pub fn natural_key(&self) -> String {
        forecast_key(&self.issue_time, &self.point)
    }

    /// Hours between issue and valid time.
    pub fn lead_time(&self) -> i32 {
        (self.point.valid_time - self.issue_time).num_hours() as i32
    }
}

fn forecast_key(issue_time: &DateTime<Utc>, point: &TrackPoint) -> String {
    format!(
        "{}|{}|{}|{}",
        point.storm_id,
        issue_time.to_rfc3339(),
        point.valid_time.to_rfc3339(),
        point.provider
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleTrack {
    pub point_id: Uuid,
    pub issue_time: DateTime<Utc>,
    pub ensemble_member: i32,
    pub point: TrackPoint,
}

impl EnsembleTrack {
    pub fn new(issue_time: DateTime<Utc>, ensemble_member: i32, point: TrackPoint) -> Self {
        let key = ensemble_key(&issue_time, ensemble_member, &point);
        EnsembleTrack {
            point_id: point_id(&key),
            issue_time,
            ensemble_member,
            point,
        }
    }

    pub fn natural_key(&self) -> String {
        ensemble_key(&self.issue_time, self.ensemble_member, &self.point)
    }

    pub fn lead_time(&self) -> i32 {
        (self.point.valid_time - self.issue_time).num_hours() as i32
    }
}

fn ensemble_key(issue_time: &DateTime<Utc>, member: i32, point: &TrackPoint) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        point.storm_id,
        issue_time.to_rfc3339(),
        point.valid_time.to_rfc3339(),
        member,
        point.provider
    )
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn should_derive_same_storm_id_across_runs() {
        let a = Storm::new(Source::Ibtracs, "2023239N15302");
        let b = Storm::new(Source::Ibtracs, "2023239N15302");
        let other_source = Storm::new(Source::Nhc, "2023239N15302");

        assert_eq!(a.storm_id, b.storm_id);
        assert_ne!(a.storm_id, other_source.storm_id);
    }

    #[test]
    fn should_write_wkt_with_longitude_first() {
        let time = Utc.with_ymd_and_hms(2023, 8, 28, 0, 0, 0).unwrap();
        let point = TrackPoint::new(Uuid::nil(), time, 20.5, -85.25, "hurdat_atl");

        assert_eq!(point.wkt(), "POINT(-85.25 20.5)");
    }

    #[test]
    fn should_key_points_on_natural_identity() {
        let issue = Utc.with_ymd_and_hms(2023, 8, 28, 0, 0, 0).unwrap();
        let valid = Utc.with_ymd_and_hms(2023, 8, 29, 12, 0, 0).unwrap();
        let point = TrackPoint::new(Uuid::nil(), valid, 20.0, -85.0, "ecmwf");

        let m1 = EnsembleTrack::new(issue, 1, point.clone());
        let m1_again = EnsembleTrack::new(issue, 1, point.clone());
        let m2 = EnsembleTrack::new(issue, 2, point);

        assert_eq!(m1.point_id, m1_again.point_id);
        assert_ne!(m1.point_id, m2.point_id);
        assert_eq!(m1.lead_time(), 36);
    }
}
