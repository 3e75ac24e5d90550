//! IBTrACS NetCDF snapshots as a relational dataset.
//!
//! The NetCDF file stores storms × time slots × quadrants as padded arrays. The
//! loader unrolls it into three tables: storms, observations (one per filled
//! time slot) and long-format quadrant rows.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::ParseError;

use super::Quadrant;
#[cfg(feature = "netcdf")]
use super::{clean_bytes, clean_number};

/// Track type marking a near-real-time record.
pub const PROVISIONAL: &str = "PROVISIONAL";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IbtracsStorm {
    pub sid: Option<String>,
    pub atcf_id: Option<String>,
    pub number: Option<i32>,
    pub season: Option<i32>,
    pub name: Option<String>,
    pub track_type: Option<String>,
}

impl IbtracsStorm {
    pub fn is_provisional(&self) -> bool {
        self.track_type.as_deref() == Some(PROVISIONAL)
    }
}

/// One filled time slot of one storm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IbtracsObservation {
    /// Index into [`IbtracsDataset::storms`].
    pub storm: usize,
    pub time: Option<DateTime<Utc>>,
    pub basin: Option<String>,
    pub nature: Option<String>,
    pub usa_agency: Option<String>,
    pub wmo_agency: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub usa_lat: Option<f64>,
    pub usa_lon: Option<f64>,
    pub wmo_wind: Option<f64>,
    pub wmo_pres: Option<f64>,
    pub usa_wind: Option<f64>,
    pub usa_pres: Option<f64>,
    pub usa_rmw: Option<f64>,
    pub usa_roci: Option<f64>,
    pub usa_poci: Option<f64>,
    pub usa_gust: Option<f64>,
}

/// Wind radii of one observation in one quadrant.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantRow {
    /// Index into [`IbtracsDataset::observations`].
    pub observation: usize,
    pub quadrant: Quadrant,
    pub r34: Option<f64>,
    pub r50: Option<f64>,
    pub r64: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IbtracsDataset {
    pub storms: Vec<IbtracsStorm>,
    pub observations: Vec<IbtracsObservation>,
    pub quadrants: Vec<QuadrantRow>,
}

/// Converts IBTrACS time (days since 1858-11-17) to UTC.
pub fn ibtracs_time(days: f64) -> Option<DateTime<Utc>> {
    let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)?.and_hms_opt(0, 0, 0)?.and_utc();
    let millis = (days * 86_400_000.0).round() as i64;

    epoch.checked_add_signed(Duration::milliseconds(millis))
}

#[cfg(feature = "netcdf")]
pub fn load_ibtracs(path: &Path) -> Result<IbtracsDataset, ParseError> {
    let file = netcdf::open(path).map_err(nc_error)?;

    let n_storms = dim_len(&file, "storm")?;
    let n_times = dim_len(&file, "date_time")?;
    let n_slots = n_storms * n_times;

    let sid = read_chars(&file, "sid")?;
    let name = read_chars(&file, "name")?;
    let track_type = read_chars(&file, "track_type")?;
    let atcf_id = read_chars(&file, "usa_atcf_id")?;
    let number = read_numbers(&file, "number")?;
    let season = read_numbers(&file, "season")?;

    let time = read_numbers(&file, "time")?;
    let basin = read_chars(&file, "basin")?;
    let nature = read_chars(&file, "nature")?;
    let usa_agency = read_chars(&file, "usa_agency")?;
    let wmo_agency = read_chars(&file, "wmo_agency")?;
    let lat = read_numbers(&file, "lat")?;
    let lon = read_numbers(&file, "lon")?;
    let usa_lat = read_numbers(&file, "usa_lat")?;
    let usa_lon = read_numbers(&file, "usa_lon")?;
    let wmo_wind = read_numbers(&file, "wmo_wind")?;
    let wmo_pres = read_numbers(&file, "wmo_pres")?;
    let usa_wind = read_numbers(&file, "usa_wind")?;
    let usa_pres = read_numbers(&file, "usa_pres")?;
    let usa_rmw = read_numbers(&file, "usa_rmw")?;
    let usa_roci = read_numbers(&file, "usa_roci")?;
    let usa_poci = read_numbers(&file, "usa_poci")?;
    let usa_gust = read_numbers(&file, "usa_gust")?;
    let r34 = read_numbers(&file, "usa_r34")?;
    let r50 = read_numbers(&file, "usa_r50")?;
    let r64 = read_numbers(&file, "usa_r64")?;

    for (var, len) in [
        ("sid", sid.len()),
        ("name", name.len()),
        ("track_type", track_type.len()),
        ("number", number.len()),
        ("season", season.len()),
    ] {
        expect_len(var, len, n_storms)?;
    }
    if atcf_id.len() != n_storms {
        expect_len("usa_atcf_id", atcf_id.len(), n_slots)?;
    }
    for (var, len) in [
        ("basin", basin.len()),
        ("nature", nature.len()),
        ("usa_agency", usa_agency.len()),
        ("wmo_agency", wmo_agency.len()),
    ] {
        expect_len(var, len, n_slots)?;
    }
    for (var, values) in [
        ("time", &time),
        ("lat", &lat),
        ("lon", &lon),
        ("usa_lat", &usa_lat),
        ("usa_lon", &usa_lon),
        ("wmo_wind", &wmo_wind),
        ("wmo_pres", &wmo_pres),
        ("usa_wind", &usa_wind),
        ("usa_pres", &usa_pres),
        ("usa_rmw", &usa_rmw),
        ("usa_roci", &usa_roci),
        ("usa_poci", &usa_poci),
        ("usa_gust", &usa_gust),
    ] {
        expect_len(var, values.len(), n_slots)?;
    }
    for (var, values) in [("usa_r34", &r34), ("usa_r50", &r50), ("usa_r64", &r64)] {
        expect_len(var, values.len(), n_slots * 4)?;
    }

    let mut dataset = IbtracsDataset::default();

    for s in 0..n_storms {
        // usa_atcf_id is stored per slot in v04; take the first filled one
        let storm_atcf = if atcf_id.len() == n_storms {
            atcf_id[s].clone()
        } else {
            (0..n_times).find_map(|t| atcf_id.get(s * n_times + t).cloned().flatten())
        };

        dataset.storms.push(IbtracsStorm {
            sid: sid[s].clone(),
            atcf_id: storm_atcf,
            number: number[s].map(|v| v as i32),
            season: season[s].map(|v| v as i32),
            name: name[s].clone(),
            track_type: track_type[s].clone(),
        });

        for t in 0..n_times {
            let i = s * n_times + t;
            // padding slot
            if time[i].is_none() && lat[i].is_none() && usa_lat[i].is_none() {
                continue;
            }

            let observation = dataset.observations.len();
            dataset.observations.push(IbtracsObservation {
                storm: s,
                time: time[i].and_then(ibtracs_time),
                basin: basin[i].clone(),
                nature: nature[i].clone(),
                usa_agency: usa_agency[i].clone(),
                wmo_agency: wmo_agency[i].clone(),
                lat: lat[i],
                lon: lon[i],
                usa_lat: usa_lat[i],
                usa_lon: usa_lon[i],
                wmo_wind: wmo_wind[i],
                wmo_pres: wmo_pres[i],
                usa_wind: usa_wind[i],
                usa_pres: usa_pres[i],
                usa_rmw: usa_rmw[i],
                usa_roci: usa_roci[i],
                usa_poci: usa_poci[i],
                usa_gust: usa_gust[i],
            });

            for quadrant in Quadrant::ALL {
                let q = i * 4 + quadrant.index();
                if r34[q].is_none() && r50[q].is_none() && r64[q].is_none() {
                    continue;
                }
                dataset.quadrants.push(QuadrantRow {
                    observation,
                    quadrant,
                    r34: r34[q],
                    r50: r50[q],
                    r64: r64[q],
                });
            }
        }
    }

    Ok(dataset)
}

#[cfg(feature = "netcdf")]
fn nc_error(e: netcdf::Error) -> ParseError {
    ParseError::NetCdf(e.to_string())
}

#[cfg(feature = "netcdf")]
fn expect_len(name: &str, len: usize, expected: usize) -> Result<(), ParseError> {
    if len == expected {
        Ok(())
    } else {
        Err(ParseError::NetCdf(format!(
            "variable {} has {} values, expected {}",
            name, len, expected
        )))
    }
}

#[cfg(feature = "netcdf")]
fn dim_len(file: &netcdf::File, name: &str) -> Result<usize, ParseError> {
    file.dimension(name)
        .map(|d| d.len())
        .ok_or_else(|| ParseError::NetCdf(format!("missing dimension {}", name)))
}

#[cfg(feature = "netcdf")]
fn variable<'f>(file: &'f netcdf::File, name: &str) -> Result<netcdf::Variable<'f>, ParseError> {
    file.variable(name)
        .ok_or_else(|| ParseError::NetCdf(format!("missing variable {}", name)))
}

// Character arrays; the last dimension is the string width
#[cfg(feature = "netcdf")]
fn read_chars(file: &netcdf::File, name: &str) -> Result<Vec<Option<String>>, ParseError> {
    let var = variable(file, name)?;
    let lens: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let width = lens.last().copied().unwrap_or(1).max(1);
    let buf = var.get_raw_values(..).map_err(nc_error)?;

    Ok(buf.chunks(width).map(clean_bytes).collect())
}

#[cfg(feature = "netcdf")]
fn read_numbers(file: &netcdf::File, name: &str) -> Result<Vec<Option<f64>>, ParseError> {
    let values = variable(file, name)?
        .get_values::<f64, _>(..)
        .map_err(nc_error)?;

    Ok(values.into_iter().map(clean_number).collect())
}

#[cfg(not(feature = "netcdf"))]
pub fn load_ibtracs(path: &Path) -> Result<IbtracsDataset, ParseError> {
    Err(ParseError::NetCdf(format!(
        "cannot read {}: built without the `netcdf` feature",
        path.display()
    )))
}

// -- Tests -------------------------------------------------------------------
