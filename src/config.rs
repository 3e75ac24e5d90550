//! Runtime settings read from the environment.

use std::path::PathBuf;

use clap::ValueEnum;

use crate::error::ConfigError;

/// Deployment target of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Parquet files and a local archive directory, no database.
    Local,
    #[default]
    Dev,
    Prod,
}

impl Mode {
    fn suffix(&self) -> Option<&'static str> {
        match self {
            Mode::Local => None,
            Mode::Dev => Some("DEV"),
            Mode::Prod => Some("PROD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `None` in local mode.
    pub database_url: Option<String>,
    /// `None` when no bucket is configured for the mode.
    pub storage: Option<StorageConfig>,
}

impl Settings {
    pub fn from_env(mode: Mode) -> Result<Self, ConfigError> {
        Self::from_lookup(mode, |key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(mode: Mode, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(suffix) = mode.suffix() else {
            return Ok(Settings {
                database_url: None,
                storage: None,
            });
        };

        let database_key = format!("STORMS_DATABASE_URL_{suffix}");
        let database_url = lookup(&database_key)
            .or_else(|| lookup("DATABASE_URL"))
            .ok_or(ConfigError::Missing(database_key))?;

        let storage = match lookup(&format!("STORMS_ARCHIVE_BUCKET_{suffix}")) {
            Some(bucket) => Some(StorageConfig {
                endpoint: lookup("S3_ENDPOINT"),
                region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                bucket,
                access_key: lookup("S3_ACCESS_KEY").ok_or(ConfigError::Missing("S3_ACCESS_KEY".to_string()))?,
                secret_key: lookup("S3_SECRET_KEY").ok_or(ConfigError::Missing("S3_SECRET_KEY".to_string()))?,
                path_style: match lookup("S3_PATH_STYLE") {
                    Some(value) => parse_bool("S3_PATH_STYLE", &value)?,
                    None => false,
                },
            }),
            None => None,
        };

        Ok(Settings {
            database_url: Some(database_url),
            storage,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Upstream base URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub ibtracs: String,
    pub ecmwf: String,
    pub nhc_current: String,
    pub nhc_aid_public: String,
    pub nhc_archive: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            ibtracs: "https://www.ncei.noaa.gov/data/international-best-track-archive-for-climate-stewardship-ibtracs/v04r01/access/netcdf".to_string(),
            ecmwf: "https://data.rda.ucar.edu/ds330.3/ecmf".to_string(),
            nhc_current: "https://www.nhc.noaa.gov/CurrentStorms.json".to_string(),
            nhc_aid_public: "https://ftp.nhc.noaa.gov/atcf/aid_public".to_string(),
            nhc_archive: "https://ftp.nhc.noaa.gov/atcf/archive".to_string(),
        }
    }
}

#[cfg(test)]
impl Endpoints {
    /// Points every source at one host, with the default paths below it.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Endpoints {
            ibtracs: format!("{base}/ibtracs"),
            ecmwf: format!("{base}/ecmf"),
            nhc_current: format!("{base}/CurrentStorms.json"),
            nhc_aid_public: format!("{base}/atcf/aid_public"),
            nhc_archive: format!("{base}/atcf/archive"),
        }
    }
}

/// Working directory for downloads, defaulting to the OS temp dir.
pub fn save_dir(requested: Option<PathBuf>) -> PathBuf {
    requested.unwrap_or_else(std::env::temp_dir)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_prefer_mode_specific_database_url() {
        let lookup = lookup_from(&[
            ("STORMS_DATABASE_URL_PROD", "postgres://prod/storms"),
            ("DATABASE_URL", "postgres://fallback/storms"),
        ]);

        let settings = Settings::from_lookup(Mode::Prod, lookup).unwrap();

        assert_eq!(settings.database_url.as_deref(), Some("postgres://prod/storms"));
        assert_eq!(settings.storage, None);
    }

    #[test]
    fn should_fall_back_to_database_url() {
        let lookup = lookup_from(&[("DATABASE_URL", "postgres://fallback/storms")]);

        let settings = Settings::from_lookup(Mode::Dev, lookup).unwrap();

        assert_eq!(settings.database_url.as_deref(), Some("postgres://fallback/storms"));
    }

    #[test]
    fn should_require_database_url_outside_local_mode() {
        let result = Settings::from_lookup(Mode::Dev, lookup_from(&[]));

        assert!(matches!(result, Err(ConfigError::Missing(key)) if key == "STORMS_DATABASE_URL_DEV"));
    }

    #[test]
    fn should_need_nothing_in_local_mode() {
        let settings = Settings::from_lookup(Mode::Local, lookup_from(&[])).unwrap();

        assert_eq!(settings.database_url, None);
        assert_eq!(settings.storage, None);
    }

    #[test]
    fn should_read_storage_when_bucket_is_set() {
        let lookup = lookup_from(&[
            ("STORMS_DATABASE_URL_DEV", "postgres://dev/storms"),
            ("STORMS_ARCHIVE_BUCKET_DEV", "storms-raw-dev"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("S3_ACCESS_KEY", "minioadmin"),
            ("S3_SECRET_KEY", "minioadmin"),
            ("S3_PATH_STYLE", "true"),
        ]);

        let storage = Settings::from_lookup(Mode::Dev, lookup).unwrap().storage.unwrap();

        assert_eq!(storage.bucket, "storms-raw-dev");
        assert_eq!(storage.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(storage.region, "us-east-1");
        assert!(storage.path_style);
    }

    #[test]
    fn should_reject_malformed_path_style() {
        let lookup = lookup_from(&[
            ("STORMS_DATABASE_URL_DEV", "postgres://dev/storms"),
            ("STORMS_ARCHIVE_BUCKET_DEV", "storms-raw-dev"),
            ("S3_ACCESS_KEY", "key"),
            ("S3_SECRET_KEY", "secret"),
            ("S3_PATH_STYLE", "sometimes"),
        ]);

        let result = Settings::from_lookup(Mode::Dev, lookup);

        assert!(matches!(result, Err(ConfigError::Invalid { name, .. }) if name == "S3_PATH_STYLE"));
    }

    #[test]
    fn should_rebase_endpoints() {
        let endpoints = Endpoints::with_base("http://127.0.0.1:8080/");

        assert_eq!(endpoints.nhc_current, "http://127.0.0.1:8080/CurrentStorms.json");
        assert_eq!(endpoints.nhc_archive, "http://127.0.0.1:8080/atcf/archive");
    }
}
