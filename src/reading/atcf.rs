//! ATCF A-deck (aids) lines.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::{error::ParseError, model::QuadrantRadii};

use super::{clean_text, Reading};

/// Technique for the combined analysis (observations at τ=0).
pub const CARQ: &str = "CARQ";
/// Technique for the official forecast.
pub const OFCL: &str = "OFCL";

#[derive(Debug, Clone, PartialEq)]
pub struct AtcfLine {
    pub basin: String,
    pub cyclone_number: u32,
    /// Year of the storm's earliest DTG in the deck, so a storm crossing
    /// 1 January keeps one identifier.
    pub season: i32,
    pub dtg: DateTime<Utc>,
    pub tech: String,
    pub tau: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub vmax: Option<f64>,
    pub mslp: Option<f64>,
    pub nature: Option<String>,
    pub threshold: Option<u32>,
    pub radii: Option<QuadrantRadii>,
    pub poci: Option<f64>,
    pub roci: Option<f64>,
    pub rmw: Option<f64>,
    pub gusts: Option<f64>,
    pub name: Option<String>,
}

impl AtcfLine {
    /// ATCF storm identifier, e.g. `AL052023`.
    pub fn atcf_id(&self) -> String {
        format!(
            "{}{:02}{}",
            self.basin,
            self.cyclone_number,
            self.season
        )
    }

    pub fn valid_time(&self) -> DateTime<Utc> {
        self.dtg + chrono::Duration::hours(self.tau)
    }
}

impl Reading for AtcfLine {
    fn from_line(line: &str, line_no: usize) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let err = |reason: &str| ParseError::Atcf {
            line: line_no,
            reason: reason.to_string(),
        };

        if fields.len() < 8 {
            return Err(err("fewer than 8 fields"));
        }

        let cyclone_number = fields[1]
            .parse()
            .map_err(|_| err("invalid cyclone number"))?;
        let dtg = parse_dtg(fields[2]).ok_or_else(|| err("invalid DTG"))?;
        let tau = fields[5].parse().map_err(|_| err("invalid tau"))?;
        let latitude = parse_coordinate(fields[6], 'N', 'S').ok_or_else(|| err("invalid latitude"))?;
        let longitude =
            parse_coordinate(fields[7], 'E', 'W').ok_or_else(|| err("invalid longitude"))?;

        let field = |i: usize| fields.get(i).copied().unwrap_or("");
        let threshold = field(11).parse::<u32>().ok().filter(|t| *t > 0);
        let radii = threshold.and_then(|_| parse_radii(field(12), &fields[13.min(fields.len())..]));

        Ok(AtcfLine {
            basin: fields[0].to_string(),
            cyclone_number,
            season: dtg.year(),
            dtg,
            tech: fields[4].to_string(),
            tau,
            latitude,
            longitude,
            vmax: parse_measure(field(8)),
            mslp: parse_positive(field(9)),
            nature: clean_text(field(10)),
            threshold,
            radii,
            poci: parse_positive(field(17)),
            roci: parse_positive(field(18)),
            rmw: parse_positive(field(19)),
            gusts: parse_positive(field(20)),
            name: clean_text(field(27)),
        })
    }
}

/// Parses the lines of an A-deck, keeping only the `CARQ` and `OFCL` techniques.
pub fn read_adeck(text: &str) -> Result<Vec<AtcfLine>, ParseError> {
    let mut lines = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let tech = line.split(',').nth(4).map(str::trim);
        if !matches!(tech, Some(CARQ) | Some(OFCL)) {
            continue;
        }
        lines.push(AtcfLine::from_line(line, i + 1)?);
    }

    let mut seasons: HashMap<(String, u32), i32> = HashMap::new();
    for line in &lines {
        seasons
            .entry((line.basin.clone(), line.cyclone_number))
            .and_modify(|season| *season = (*season).min(line.season))
            .or_insert(line.season);
    }
    for line in &mut lines {
        if let Some(season) = seasons.get(&(line.basin.clone(), line.cyclone_number)) {
            line.season = *season;
        }
    }

    Ok(lines)
}

fn parse_dtg(raw: &str) -> Option<DateTime<Utc>> {
    if raw.len() != 10 || !raw.is_ascii() {
        return None;
    }
    let date = NaiveDate::parse_from_str(&raw[..8], "%Y%m%d").ok()?;
    let hour = raw[8..].parse().ok()?;

    Some(date.and_hms_opt(hour, 0, 0)?.and_utc())
}

// "255N" is 25.5 degrees north
fn parse_coordinate(raw: &str, positive: char, negative: char) -> Option<f64> {
    let hemisphere = raw.chars().last()?;
    let tenths: f64 = raw.strip_suffix(hemisphere)?.parse().ok()?;
    let degrees = tenths / 10.0;

    match hemisphere {
        h if h == positive => Some(degrees),
        h if h == negative => Some(-degrees),
        _ => None,
    }
}

fn parse_measure(raw: &str) -> Option<f64> {
    raw.parse().ok()
}

// Zero marks an unknown value for pressures and radii of the outer isobar
fn parse_positive(raw: &str) -> Option<f64> {
    parse_measure(raw).filter(|v| *v > 0.0)
}

fn parse_radii(code: &str, values: &[&str]) -> Option<QuadrantRadii> {
    let value = |i: usize| values.get(i).and_then(|v| parse_measure(v));

    match code {
        "AAA" => value(0).map(|r| [Some(r); 4]),
        "NEQ" => {
            let radii = [value(0), value(1), value(2), value(3)];
            radii.iter().any(Option::is_some).then_some(radii)
        }
        _ => None,
    }
}

// -- Tests -------------------------------------------------------------------
