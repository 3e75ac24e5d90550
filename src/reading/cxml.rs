//! TIGGE tropical cyclone bundles in CXML.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::ParseError;

use super::clean_text;

const KNOTS_PER_MS: f64 = 1.943844;
const KNOTS_PER_KMH: f64 = 0.539957;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastKind {
    Analysis,
    Deterministic,
    Ensemble,
}

impl ForecastKind {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "analysis" => Some(ForecastKind::Analysis),
            "forecast" => Some(ForecastKind::Deterministic),
            "ensembleForecast" => Some(ForecastKind::Ensemble),
            _ => None,
        }
    }
}

/// One fix of one disturbance in one member, flattened out of the bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct CxmlFix {
    pub kind: ForecastKind,
    pub member: Option<i32>,
    pub issue_time: DateTime<Utc>,
    pub disturbance_id: String,
    pub cyclone_name: Option<String>,
    pub cyclone_number: Option<String>,
    pub basin: Option<String>,
    pub hour: i64,
    pub valid_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pressure: Option<f64>,
    /// Maximum wind in knots.
    pub wind_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Cxml {
    header: Header,
    #[serde(default)]
    data: Vec<Data>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(rename = "baseTime")]
    base_time: String,
}

#[derive(Debug, Deserialize)]
struct Data {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@member", default)]
    member: Option<i32>,
    #[serde(default)]
    disturbance: Vec<Disturbance>,
}

#[derive(Debug, Deserialize)]
struct Disturbance {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "cycloneName", default)]
    cyclone_name: Option<String>,
    #[serde(rename = "cycloneNumber", default)]
    cyclone_number: Option<String>,
    #[serde(default)]
    basin: Option<String>,
    #[serde(default)]
    fix: Vec<Fix>,
}

#[derive(Debug, Deserialize)]
struct Fix {
    #[serde(rename = "@hour", default)]
    hour: i64,
    #[serde(rename = "validTime", default)]
    valid_time: Option<String>,
    #[serde(default)]
    latitude: Option<Measure>,
    #[serde(default)]
    longitude: Option<Measure>,
    #[serde(rename = "cycloneData", default)]
    cyclone_data: Option<CycloneData>,
}

#[derive(Debug, Deserialize)]
struct Measure {
    #[serde(rename = "@units", default)]
    units: String,
    #[serde(rename = "$text")]
    value: f64,
}

#[derive(Debug, Default, Deserialize)]
struct CycloneData {
    #[serde(rename = "minimumPressure", default)]
    minimum_pressure: Option<Pressure>,
    #[serde(rename = "maximumWind", default)]
    maximum_wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct Pressure {
    #[serde(default)]
    pressure: Option<Measure>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: Option<Measure>,
}

/// Parses a CXML bundle into its fixes. Members of unknown type are skipped.
pub fn read_cxml(xml: &str) -> Result<Vec<CxmlFix>, ParseError> {
    let doc: Cxml = quick_xml::de::from_str(xml)?;
    let issue_time = parse_time(&doc.header.base_time)?;

    let mut fixes = Vec::new();
    for data in doc.data {
        let Some(kind) = ForecastKind::from_type(&data.kind) else {
            continue;
        };

        for disturbance in data.disturbance {
            let cyclone_name = disturbance.cyclone_name.as_deref().and_then(clean_text);
            let cyclone_number = disturbance.cyclone_number.as_deref().and_then(clean_text);
            let basin = disturbance.basin.as_deref().and_then(clean_text);

            for fix in disturbance.fix {
                let valid_time = fix.valid_time.as_deref().map(parse_time).transpose()?;
                let cyclone_data = fix.cyclone_data.unwrap_or_default();

                fixes.push(CxmlFix {
                    kind,
                    member: data.member,
                    issue_time,
                    disturbance_id: disturbance.id.clone(),
                    cyclone_name: cyclone_name.clone(),
                    cyclone_number: cyclone_number.clone(),
                    basin: basin.clone(),
                    hour: fix.hour,
                    valid_time,
                    latitude: fix.latitude.map(|m| signed(m, 'S')),
                    longitude: fix.longitude.map(|m| signed(m, 'W')),
                    pressure: cyclone_data
                        .minimum_pressure
                        .and_then(|p| p.pressure)
                        .map(|m| m.value),
                    wind_speed: cyclone_data
                        .maximum_wind
                        .and_then(|w| w.speed)
                        .map(to_knots),
                });
            }
        }
    }

    Ok(fixes)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|t| t.and_utc()))
        .map_err(|_| ParseError::Timestamp(raw.to_string()))
}

// Units such as "deg S" or "deg W" flip the sign
fn signed(measure: Measure, negative: char) -> f64 {
    if measure.units.trim_end().ends_with(negative) {
        -measure.value
    } else {
        measure.value
    }
}

fn to_knots(speed: Measure) -> f64 {
    match speed.units.as_str() {
        "m/s" => speed.value * KNOTS_PER_MS,
        "km/h" => speed.value * KNOTS_PER_KMH,
        _ => speed.value,
    }
}

// -- Tests -------------------------------------------------------------------
