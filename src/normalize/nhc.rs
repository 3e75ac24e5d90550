//! NHC storms and tracks from the current feed and ATCF A-decks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    model::{storm_id, ForecastTrack, ObservedTrack, Source, Storm, TrackPoint},
    reading::{
        atcf::{AtcfLine, CARQ, OFCL},
        nhc_current::ActiveStorm,
    },
};

use super::{Threshold, WindRadii};

/// Provider of points read from `CurrentStorms.json`.
const CURRENT_PROVIDER: &str = "nhc";

// -- Current feed ------------------------------------------------------------

pub fn current_storms(active: &[ActiveStorm]) -> Vec<Storm> {
    active
        .iter()
        .map(|a| {
            let sid = a.atcf_id();
            let mut storm = Storm::new(Source::Nhc, sid.clone());
            storm.atcf_id = Some(sid.clone());
            storm.number = sid.get(2..4).and_then(|n| n.parse().ok());
            storm.season = sid.get(4..8).and_then(|n| n.parse().ok());
            storm.genesis_basin = sid.get(0..2).map(str::to_string);
            storm.name = a.name.clone().filter(|n| !n.trim().is_empty());
            storm.provisional = true;
            storm
        })
        .collect()
}

pub fn current_tracks(active: &[ActiveStorm]) -> Vec<ObservedTrack> {
    active
        .iter()
        .filter_map(|a| {
            let sid = a.atcf_id();
            let mut point = TrackPoint::new(
                storm_id(Source::Nhc, &sid),
                a.last_update?,
                a.latitude_numeric?,
                a.longitude_numeric?,
                CURRENT_PROVIDER,
            );
            point.wind_speed = a.wind_speed();
            point.pressure = a.min_pressure();
            point.nature = a.classification.clone();
            point.basin = sid.get(0..2).map(str::to_string);

            Some(ObservedTrack::new(point))
        })
        .collect()
}

// -- A-deck ------------------------------------------------------------------

/// One storm per ATCF id; the last non-blank name wins.
pub fn adeck_storms(lines: &[AtcfLine]) -> Vec<Storm> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut storms: Vec<Storm> = Vec::new();

    for line in lines {
        let sid = line.atcf_id();
        let position = *index.entry(sid.clone()).or_insert_with(|| {
            let mut storm = Storm::new(Source::Nhc, sid.clone());
            storm.atcf_id = Some(sid);
            storm.number = Some(line.cyclone_number as i32);
            storm.season = Some(line.season);
            storm.genesis_basin = Some(line.basin.clone());
            storm.provisional = true;
            storms.push(storm);
            storms.len() - 1
        });

        if line.name.is_some() {
            storms[position].name.clone_from(&line.name);
        }
    }

    storms
}

/// `CARQ` analyses at τ=0.
pub fn adeck_observations(lines: &[AtcfLine]) -> Vec<ObservedTrack> {
    merge_thresholds(lines.iter().filter(|l| l.tech == CARQ && l.tau == 0))
        .into_iter()
        .map(|(_, point)| ObservedTrack::new(point))
        .collect()
}

/// `OFCL` forecasts, issued at the DTG and valid τ hours later.
pub fn adeck_forecasts(lines: &[AtcfLine]) -> Vec<ForecastTrack> {
    merge_thresholds(lines.iter().filter(|l| l.tech == OFCL))
        .into_iter()
        .map(|(issue_time, point)| ForecastTrack::new(issue_time, point))
        .collect()
}

// A-decks repeat each point once per wind threshold (34, 50, 64 kt)
fn merge_thresholds<'a>(
    lines: impl Iterator<Item = &'a AtcfLine>,
) -> Vec<(DateTime<Utc>, TrackPoint)> {
    let mut index: HashMap<(String, DateTime<Utc>, String, i64), usize> = HashMap::new();
    let mut merged: Vec<(DateTime<Utc>, TrackPoint, WindRadii)> = Vec::new();

    for line in lines {
        let sid = line.atcf_id();
        let key = (sid.clone(), line.dtg, line.tech.clone(), line.tau);

        let position = *index.entry(key).or_insert_with(|| {
            let mut point = TrackPoint::new(
                storm_id(Source::Nhc, &sid),
                line.valid_time(),
                line.latitude,
                line.longitude,
                line.tech.as_str(),
            );
            point.wind_speed = line.vmax;
            point.pressure = line.mslp;
            point.gust_speed = line.gusts;
            point.max_wind_radius = line.rmw;
            point.last_closed_isobar_radius = line.roci;
            point.last_closed_isobar_pressure = line.poci;
            point.nature = line.nature.clone();
            point.basin = Some(line.basin.clone());
            merged.push((line.dtg, point, WindRadii::default()));
            merged.len() - 1
        });

        if let (Some(threshold), Some(radii)) = (
            line.threshold.and_then(Threshold::from_knots),
            line.radii,
        ) {
            merged[position].2.set_all(threshold, radii);
        }
    }

    merged
        .into_iter()
        .map(|(issue_time, mut point, radii)| {
            radii.apply(&mut point);
            (issue_time, point)
        })
        .collect()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::reading::{read_adeck, read_current_storms};

    use super::*;

    const ADECK: &str = "\
AL, 10, 2023082800,   , CARQ,   0, 211N,  850W,  55,  994, TS,  34, NEQ,   90,   60,   40,   70, 1008,  150,  20,  65,   0,   L,   0,    ,   0,   0,           , D,
AL, 10, 2023082800,   , CARQ,   0, 211N,  850W,  55,  994, TS,  50, NEQ,   30,    0,    0,   20, 1008,  150,  20,  65,   0,   L,   0,    ,   0,   0,     IDALIA, D,
AL, 10, 2023082800,   , CARQ, -12, 200N,  845W,  45, 1000, TS,  34, NEQ,   60,   40,   20,   50, 1008,  150,  20,  65,   0,   L,   0,    ,   0,   0,     IDALIA, D,
AL, 10, 2023082800, 03, OFCL,   0, 211N,  850W,  55,    0, TS,  34, NEQ,   90,   60,   40,   70,    0,    0,   0,   0,   0,    ,   0,    ,   0,   0,     IDALIA,
AL, 10, 2023082800, 03, OFCL,  12, 225N,  851W,  65,    0, TS,  34, AAA,  100,    0,    0,    0,    0,    0,   0,   0,   0,    ,   0,    ,   0,   0,     IDALIA,
AL, 10, 2023082800, 03, OFCL,  12, 225N,  851W,  65,    0, TS,  50, NEQ,   40,   30,    0,    0,    0,    0,   0,   0,   0,    ,   0,    ,   0,   0,     IDALIA,
";

    #[test]
    fn should_merge_threshold_rows_into_one_observation() {
        let lines = read_adeck(ADECK).unwrap();

        let observations = adeck_observations(&lines);

        assert_eq!(observations.len(), 1);
        let point = &observations[0].point;
        assert_eq!(point.provider, "CARQ");
        assert_eq!(
            point.quadrant_radius_34,
            Some([Some(90.0), Some(60.0), Some(40.0), Some(70.0)])
        );
        assert_eq!(
            point.quadrant_radius_50,
            Some([Some(30.0), Some(0.0), Some(0.0), Some(20.0)])
        );
        assert_eq!(point.quadrant_radius_64, None);
    }

    #[test]
    fn should_offset_forecasts_by_tau() {
        let lines = read_adeck(ADECK).unwrap();

        let forecasts = adeck_forecasts(&lines);

        assert_eq!(forecasts.len(), 2);
        let issue = Utc.with_ymd_and_hms(2023, 8, 28, 0, 0, 0).unwrap();
        assert_eq!(forecasts[1].issue_time, issue);
        assert_eq!(forecasts[1].point.valid_time, issue + chrono::Duration::hours(12));
        assert_eq!(forecasts[1].lead_time(), 12);
        assert_eq!(forecasts[1].point.quadrant_radius_34, Some([Some(100.0); 4]));
        assert_eq!(forecasts[1].point.pressure, None);
    }

    #[test]
    fn should_keep_last_non_blank_name() {
        let lines = read_adeck(ADECK).unwrap();

        let storms = adeck_storms(&lines);

        assert_eq!(storms.len(), 1);
        assert_eq!(storms[0].sid, "AL102023");
        assert_eq!(storms[0].name.as_deref(), Some("IDALIA"));
        assert_eq!(storms[0].season, Some(2023));
        assert!(storms[0].provisional);
    }

    #[test]
    fn should_share_storm_id_between_feed_and_adeck() {
        let json = r#"{"activeStorms":[{"id":"al102023","name":"Idalia","classification":"HU",
            "intensity":"75","pressure":"980","latitudeNumeric":24.1,"longitudeNumeric":-84.9,
            "lastUpdate":"2023-08-29T09:00:00Z"}]}"#;
        let active = read_current_storms(json).unwrap();
        let lines = read_adeck(ADECK).unwrap();

        let current = current_storms(&active);
        let tracks = current_tracks(&active);

        assert_eq!(current[0].storm_id, adeck_storms(&lines)[0].storm_id);
        assert_eq!(current[0].number, Some(10));
        assert_eq!(current[0].genesis_basin.as_deref(), Some("AL"));
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].point.wind_speed, Some(75.0));
        assert_eq!(tracks[0].point.nature.as_deref(), Some("HU"));
    }

    #[test]
    fn should_keep_storm_whole_across_new_year() {
        let text = "\
AL, 30, 2005123118,   , CARQ,   0, 245N,  380W,  45, 1000, TS,  34, NEQ,    0,    0,    0,    0, 1010,  150,  30,   0,   0,   L,   0,    ,   0,   0,       ZETA, D,
AL, 30, 2006010100,   , CARQ,   0, 243N,  384W,  45, 1000, TS,  34, NEQ,    0,    0,    0,    0, 1010,  150,  30,   0,   0,   L,   0,    ,   0,   0,       ZETA, D,
";
        let lines = read_adeck(text).unwrap();

        let storms = adeck_storms(&lines);
        let observations = adeck_observations(&lines);

        assert_eq!(storms.len(), 1);
        assert_eq!(storms[0].sid, "AL302005");
        assert_eq!(storms[0].season, Some(2005));
        assert_eq!(observations.len(), 2);
        assert!(observations
            .iter()
            .all(|o| o.point.storm_id == storms[0].storm_id));
    }
}
