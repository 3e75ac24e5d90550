//! IBTrACS storms and observed tracks.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{
    model::{storm_id, ObservedTrack, Source, Storm, TrackPoint},
    reading::ibtracs::IbtracsDataset,
};

use super::{Threshold, WindRadii};

/// One storm per `sid`, first occurrence wins.
pub fn storms(dataset: &IbtracsDataset) -> Vec<Storm> {
    let mut genesis: HashMap<usize, Option<String>> = HashMap::new();
    for observation in dataset.observations.iter().filter(|o| o.time.is_some()) {
        genesis
            .entry(observation.storm)
            .or_insert_with(|| observation.basin.clone());
    }

    let mut seen = HashSet::new();
    let mut storms = Vec::new();

    for (index, raw) in dataset.storms.iter().enumerate() {
        let Some(sid) = &raw.sid else {
            continue;
        };
        if !seen.insert(sid.clone()) {
            continue;
        }

        let mut storm = Storm::new(Source::Ibtracs, sid.clone());
        storm.atcf_id = raw.atcf_id.clone();
        storm.number = raw.number;
        storm.season = raw.season;
        storm.name = raw.name.clone();
        storm.genesis_basin = genesis.get(&index).cloned().flatten();
        storm.provisional = raw.is_provisional();
        storms.push(storm);
    }

    storms
}

/// Observed points for both best-track and provisional storms.
pub fn tracks(dataset: &IbtracsDataset) -> Vec<ObservedTrack> {
    let mut radii: HashMap<usize, WindRadii> = HashMap::new();
    for row in &dataset.quadrants {
        let entry = radii.entry(row.observation).or_default();
        entry.set(Threshold::Kt34, row.quadrant, row.r34);
        entry.set(Threshold::Kt50, row.quadrant, row.r50);
        entry.set(Threshold::Kt64, row.quadrant, row.r64);
    }

    let mut tracks = Vec::with_capacity(dataset.observations.len());
    let mut dropped = 0;

    for (index, observation) in dataset.observations.iter().enumerate() {
        let Some(storm) = dataset.storms.get(observation.storm) else {
            dropped += 1;
            continue;
        };
        let Some(sid) = &storm.sid else {
            dropped += 1;
            continue;
        };
        let provisional = storm.is_provisional();

        let (latitude, longitude, wind, pressure, agency) = if provisional {
            (
                observation.usa_lat,
                observation.usa_lon,
                observation.usa_wind,
                observation.usa_pres,
                &observation.usa_agency,
            )
        } else {
            (
                observation.lat,
                observation.lon,
                observation.wmo_wind,
                observation.wmo_pres,
                &observation.wmo_agency,
            )
        };

        let (Some(valid_time), Some(latitude), Some(longitude)) =
            (observation.time, latitude, longitude)
        else {
            dropped += 1;
            continue;
        };

        let provider = agency.as_deref().unwrap_or(Source::Ibtracs.as_str());
        let mut point = TrackPoint::new(
            storm_id(Source::Ibtracs, sid),
            valid_time,
            latitude,
            longitude,
            provider,
        );
        point.wind_speed = wind;
        point.pressure = pressure;
        point.gust_speed = observation.usa_gust;
        point.max_wind_radius = observation.usa_rmw;
        point.last_closed_isobar_radius = observation.usa_roci;
        point.last_closed_isobar_pressure = observation.usa_poci;
        point.nature = observation.nature.clone();
        point.basin = observation.basin.clone();
        if let Some(r) = radii.get(&index) {
            r.apply(&mut point);
        }

        tracks.push(ObservedTrack::new(point));
    }

    if dropped > 0 {
        debug!("Dropped {} IBTrACS observations without time or position", dropped);
    }

    tracks
}

// -- Tests -------------------------------------------------------------------
