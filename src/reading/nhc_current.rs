//! NHC `CurrentStorms.json`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ParseError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentStorms {
    #[serde(default)]
    active_storms: Vec<ActiveStorm>,
}

/// One entry of `activeStorms`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveStorm {
    /// Lowercase ATCF id, e.g. `al102023`.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub intensity: Option<String>,
    #[serde(default)]
    pub pressure: Option<String>,
    #[serde(default)]
    pub latitude_numeric: Option<f64>,
    #[serde(default)]
    pub longitude_numeric: Option<f64>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl ActiveStorm {
    pub fn atcf_id(&self) -> String {
        self.id.to_uppercase()
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.intensity.as_deref().and_then(|v| v.trim().parse().ok())
    }

    pub fn min_pressure(&self) -> Option<f64> {
        self.pressure.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

pub fn read_current_storms(json: &str) -> Result<Vec<ActiveStorm>, ParseError> {
    let current: CurrentStorms = serde_json::from_str(json)?;
    Ok(current.active_storms)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_read_active_storms() {
        let json = r#"{"activeStorms":[{"id":"al102023","binNumber":"AT5","name":"Idalia",
            "classification":"HU","intensity":"75","pressure":"980",
            "latitudeNumeric":24.1,"longitudeNumeric":-84.9,
            "lastUpdate":"2023-08-29T09:00:00.000Z"}]}"#;

        let storms = read_current_storms(json).unwrap();

        assert_eq!(storms.len(), 1);
        assert_eq!(storms[0].atcf_id(), "AL102023");
        assert_eq!(storms[0].wind_speed(), Some(75.0));
        assert_eq!(storms[0].min_pressure(), Some(980.0));
        assert_eq!(storms[0].longitude_numeric, Some(-84.9));
    }

    #[test]
    fn should_read_empty_feed() {
        assert!(read_current_storms(r#"{"activeStorms":[]}"#).unwrap().is_empty());
        assert!(read_current_storms("{}").unwrap().is_empty());
    }
}
