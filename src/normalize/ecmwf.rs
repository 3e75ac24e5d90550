//! ECMWF storms, deterministic forecasts and ensemble members.

use std::collections::HashMap;

use chrono::Datelike;

use crate::{
    model::{storm_id, EnsembleTrack, ForecastTrack, Source, Storm, TrackPoint},
    reading::cxml::{CxmlFix, ForecastKind},
};

const PROVIDER: &str = "ecmwf";

/// ECMWF has no stable storm identifier; disturbance id and season stand in.
/// The season is the issue year, so cycles on either side of 1 January land
/// on two storms.
pub fn storm_sid(fix: &CxmlFix) -> String {
    format!("{}_{}", fix.disturbance_id, fix.issue_time.year()).to_uppercase()
}

pub fn storms(fixes: &[CxmlFix]) -> Vec<Storm> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut storms: Vec<Storm> = Vec::new();

    for fix in fixes.iter().filter(|f| f.kind != ForecastKind::Analysis) {
        let sid = storm_sid(fix);
        let position = *index.entry(sid.clone()).or_insert_with(|| {
            let mut storm = Storm::new(Source::Ecmwf, sid);
            storm.season = Some(fix.issue_time.year());
            storm.number = fix.cyclone_number.as_deref().and_then(|n| n.parse().ok());
            storm.genesis_basin = fix.basin.clone();
            storm.provisional = true;
            storms.push(storm);
            storms.len() - 1
        });

        let storm = &mut storms[position];
        if fix.cyclone_name.is_some() {
            storm.name.clone_from(&fix.cyclone_name);
        }
        if storm.number.is_none() {
            storm.number = fix.cyclone_number.as_deref().and_then(|n| n.parse().ok());
        }
    }

    storms
}

pub fn forecast_tracks(fixes: &[CxmlFix]) -> Vec<ForecastTrack> {
    fixes
        .iter()
        .filter(|f| f.kind == ForecastKind::Deterministic)
        .filter_map(|f| Some(ForecastTrack::new(f.issue_time, track_point(f)?)))
        .collect()
}

pub fn ensemble_tracks(fixes: &[CxmlFix]) -> Vec<EnsembleTrack> {
    fixes
        .iter()
        .filter(|f| f.kind == ForecastKind::Ensemble)
        .filter_map(|f| Some(EnsembleTrack::new(f.issue_time, f.member?, track_point(f)?)))
        .collect()
}

fn track_point(fix: &CxmlFix) -> Option<TrackPoint> {
    let mut point = TrackPoint::new(
        storm_id(Source::Ecmwf, &storm_sid(fix)),
        fix.valid_time?,
        fix.latitude?,
        fix.longitude?,
        PROVIDER,
    );
    point.wind_speed = fix.wind_speed;
    point.pressure = fix.pressure;
    point.basin = fix.basin.clone();

    Some(point)
}

// -- Tests -------------------------------------------------------------------
