//! Table bindings for storms and track points.

use sqlx::{query_builder::Separated, Postgres};

use crate::model::{EnsembleTrack, ForecastTrack, ObservedTrack, QuadrantRadii, Storm, TrackPoint};

/// A row of a table with a natural-key uniqueness constraint.
pub trait Record {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const CONFLICT_KEY: &'static [&'static str];
    /// Surrogate id; kept on conflict.
    const ID_COLUMN: &'static str;

    fn natural_key(&self) -> String;

    /// Pushes the values of `COLUMNS`, in order.
    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>);
}

// Shared leading columns of every track table
macro_rules! track_columns {
    ($($extra:literal),*) => {
        &[
            "point_id",
            "storm_id",
            "valid_time",
            "latitude",
            "longitude",
            "geometry",
            "wind_speed",
            "pressure",
            "gust_speed",
            "max_wind_radius",
            "last_closed_isobar_radius",
            "last_closed_isobar_pressure",
            "quadrant_radius_34",
            "quadrant_radius_50",
            "quadrant_radius_64",
            "nature",
            "basin",
            "provider"
            $(, $extra)*
        ]
    };
}

impl Record for Storm {
    const TABLE: &'static str = "storms";
    const COLUMNS: &'static [&'static str] = &[
        "storm_id",
        "sid",
        "source",
        "atcf_id",
        "number",
        "season",
        "name",
        "genesis_basin",
        "provisional",
    ];
    const CONFLICT_KEY: &'static [&'static str] = &["sid", "source"];
    const ID_COLUMN: &'static str = "storm_id";

    fn natural_key(&self) -> String {
        Storm::natural_key(self)
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.storm_id)
            .push_bind(self.sid.clone())
            .push_bind(self.source.as_str())
            .push_bind(self.atcf_id.clone())
            .push_bind(self.number)
            .push_bind(self.season)
            .push_bind(self.name.clone())
            .push_bind(self.genesis_basin.clone())
            .push_bind(self.provisional);
    }
}

impl Record for ObservedTrack {
    const TABLE: &'static str = "observed_tracks";
    const COLUMNS: &'static [&'static str] = track_columns!();
    const CONFLICT_KEY: &'static [&'static str] = &["storm_id", "valid_time", "provider"];
    const ID_COLUMN: &'static str = "point_id";

    fn natural_key(&self) -> String {
        ObservedTrack::natural_key(self)
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.point_id);
        bind_point(&self.point, row);
    }
}

impl Record for ForecastTrack {
    const TABLE: &'static str = "forecast_tracks";
    const COLUMNS: &'static [&'static str] = track_columns!("issue_time", "lead_time");
    const CONFLICT_KEY: &'static [&'static str] =
        &["storm_id", "issue_time", "valid_time", "provider"];
    const ID_COLUMN: &'static str = "point_id";

    fn natural_key(&self) -> String {
        ForecastTrack::natural_key(self)
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.point_id);
        bind_point(&self.point, row);
        row.push_bind(self.issue_time).push_bind(self.lead_time());
    }
}

impl Record for EnsembleTrack {
    const TABLE: &'static str = "forecast_track_ensembles";
    const COLUMNS: &'static [&'static str] =
        track_columns!("issue_time", "lead_time", "ensemble_member");
    const CONFLICT_KEY: &'static [&'static str] =
        &["storm_id", "issue_time", "valid_time", "ensemble_member", "provider"];
    const ID_COLUMN: &'static str = "point_id";

    fn natural_key(&self) -> String {
        EnsembleTrack::natural_key(self)
    }

    fn bind(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.point_id);
        bind_point(&self.point, row);
        row.push_bind(self.issue_time)
            .push_bind(self.lead_time())
            .push_bind(self.ensemble_member);
    }
}

// Shared track columns after point_id
fn bind_point(point: &TrackPoint, row: &mut Separated<'_, '_, Postgres, &'static str>) {
    row.push_bind(point.storm_id)
        .push_bind(point.valid_time)
        .push_bind(point.latitude)
        .push_bind(point.longitude);
    row.push("ST_GeomFromText(")
        .push_bind_unseparated(point.wkt())
        .push_unseparated(", 4326)");
    row.push_bind(point.wind_speed)
        .push_bind(point.pressure)
        .push_bind(point.gust_speed)
        .push_bind(point.max_wind_radius)
        .push_bind(point.last_closed_isobar_radius)
        .push_bind(point.last_closed_isobar_pressure)
        .push_bind(radii_array(point.quadrant_radius_34))
        .push_bind(radii_array(point.quadrant_radius_50))
        .push_bind(radii_array(point.quadrant_radius_64))
        .push_bind(point.nature.clone())
        .push_bind(point.basin.clone())
        .push_bind(point.provider.clone());
}

/// Radii as a `DOUBLE PRECISION[]` value, NULL elements included.
pub fn radii_array(radii: Option<QuadrantRadii>) -> Option<Vec<Option<f64>>> {
    radii.map(|r| r.to_vec())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_extend_track_columns_per_table() {
        assert_eq!(ObservedTrack::COLUMNS.len(), 18);
        assert_eq!(ForecastTrack::COLUMNS[18], "issue_time");
        assert_eq!(EnsembleTrack::COLUMNS.last(), Some(&"ensemble_member"));
        assert_eq!(ObservedTrack::COLUMNS[17], "provider");
    }

    #[test]
    fn should_include_every_conflict_key_in_columns() {
        fn check<R: Record>() {
            for key in R::CONFLICT_KEY {
                assert!(R::COLUMNS.contains(key), "{} missing {}", R::TABLE, key);
            }
            assert!(R::COLUMNS.contains(&R::ID_COLUMN));
        }

        check::<Storm>();
        check::<ObservedTrack>();
        check::<ForecastTrack>();
        check::<EnsembleTrack>();
    }

    #[test]
    fn should_keep_null_quadrants_in_array() {
        let array = radii_array(Some([Some(10.0), Some(20.0), None, Some(40.0)]));

        assert_eq!(array, Some(vec![Some(10.0), Some(20.0), None, Some(40.0)]));
        assert_eq!(radii_array(None), None);
    }
}
