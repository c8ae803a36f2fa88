use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::cookie::get_weather_code_from_cookie;
use crate::database::{DatabaseHandle, GeoSource, LookupError};
use crate::dump::dump_failed_lookup;
use crate::value::Value;
use crate::weather::{lookup_field, lookup_name, lookup_weather};

pub const DEFAULT_CITY_DB: &str = "/mnt/mmdb/GeoLite2-City.mmdb";
pub const DEFAULT_COOKIE_NAME: &str = "wx";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// City-edition database, used for every lookup.
    pub city_db: PathBuf,
    /// Country-edition database, preferred for country names when present.
    pub country_db: Option<PathBuf>,
    /// Fall back to the default weather code instead of `--` markers.
    pub use_default: bool,
    /// Cookie carrying a previously issued weather code.
    pub cookie_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            city_db: PathBuf::from(DEFAULT_CITY_DB),
            country_db: None,
            use_default: true,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by `GEO_CITY_DB`, `GEO_COUNTRY_DB`,
    /// `GEO_USE_DEFAULT` and `GEO_COOKIE_NAME`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("GEO_CITY_DB") {
            config.city_db = PathBuf::from(path);
        }
        if let Ok(path) = env::var("GEO_COUNTRY_DB") {
            if !path.is_empty() {
                config.country_db = Some(PathBuf::from(path));
            }
        }
        if let Ok(flag) = env::var("GEO_USE_DEFAULT") {
            config.use_default = parse_flag(&flag);
        }
        if let Ok(name) = env::var("GEO_COOKIE_NAME") {
            config.cookie_name = name;
        }
        config
    }
}

/// Anything but an explicit "off" spelling counts as enabled.
///
/// Off spellings are `0`, `n`, `no`, `f`, `false`, `off` and the empty
/// string, case-insensitive, ignoring surrounding whitespace. The CLI parses
/// `--use-default` through this function too.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "" | "0" | "n" | "no" | "f" | "false" | "off"
    )
}

/// The configured databases plus the lookup policy, ready to serve requests.
///
/// A database that fails to open is logged and left out; weather lookups then
/// degrade to the default code instead of failing.
pub struct Geo {
    city: Option<DatabaseHandle>,
    country: Option<DatabaseHandle>,
    use_default: bool,
    cookie_name: String,
}

impl Geo {
    pub fn open(config: &Config) -> Self {
        let city = open_logged(&config.city_db);
        let country = config.country_db.as_deref().and_then(open_logged);

        Self {
            city,
            country,
            use_default: config.use_default,
            cookie_name: config.cookie_name.clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.city.is_some()
    }

    pub fn weather(&self, ip: &str) -> String {
        lookup_weather(self.city.as_ref(), ip, self.use_default)
    }

    pub fn weather_from_cookie(&self, header: &str) -> Option<String> {
        get_weather_code_from_cookie(header, &self.cookie_name)
    }

    pub fn city(&self, ip: &str) -> Option<String> {
        lookup_name(self.city.as_ref(), ip, "city")
    }

    /// Country name, from the Country edition when it is open.
    pub fn country(&self, ip: &str) -> Option<String> {
        self.country
            .as_ref()
            .and_then(|db| lookup_name(Some(db), ip, "country"))
            .or_else(|| lookup_name(self.city.as_ref(), ip, "country"))
    }

    pub fn field(&self, ip: &str, path: &[&str]) -> Option<String> {
        lookup_field(self.city.as_ref(), ip, path)
    }

    /// The full City-edition record for `ip`.
    pub fn record(&self, ip: &str) -> Result<Option<Value>, LookupError> {
        match &self.city {
            Some(db) => db.lookup_ip(ip),
            None => Err(LookupError::Unavailable),
        }
    }

    pub fn dump(&self, ip: &str, output: &Path) -> bool {
        dump_failed_lookup(self.city.as_ref(), ip, output)
    }

    pub fn close(self) {
        crate::database::close(self.city);
        crate::database::close(self.country);
    }
}

fn open_logged(path: &Path) -> Option<DatabaseHandle> {
    match DatabaseHandle::open(path) {
        Ok(db) => {
            info!("Using {} database {:?}", db.database_type(), path);
            Some(db)
        }
        Err(e) => {
            warn!("Geolocation database unavailable: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::{DEFAULT_WEATHER_CODE, REGION_ISO_CODE};
    use tempfile::tempdir;

    #[test]
    fn test_parse_flag() {
        for off in ["0", "false", "FALSE", "no", "Off", " n ", "f", "", "  "] {
            assert!(!parse_flag(off), "{off:?} should be off");
        }
        for on in ["1", "true", "yes", "on", "y", "enabled"] {
            assert!(parse_flag(on), "{on:?} should be on");
        }
    }

    #[test]
    fn test_config_deserialize_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"use_default": false, "cookie_name": "weather"}"#).unwrap();
        assert_eq!(config.city_db, PathBuf::from(DEFAULT_CITY_DB));
        assert_eq!(config.country_db, None);
        assert!(!config.use_default);
        assert_eq!(config.cookie_name, "weather");
    }

    #[test]
    fn test_geo_without_databases_degrades() {
        let dir = tempdir().unwrap();
        let config = Config {
            city_db: dir.path().join("missing-city.mmdb"),
            country_db: Some(dir.path().join("missing-country.mmdb")),
            use_default: false,
            cookie_name: "wx".to_string(),
        };
        let geo = Geo::open(&config);

        assert!(!geo.is_ready());
        assert_eq!(geo.weather("8.8.8.8"), DEFAULT_WEATHER_CODE);
        assert_eq!(geo.weather("not an ip"), DEFAULT_WEATHER_CODE);
        assert_eq!(geo.city("8.8.8.8"), None);
        assert_eq!(geo.country("8.8.8.8"), None);
        assert_eq!(geo.field("8.8.8.8", REGION_ISO_CODE), None);
        assert!(matches!(geo.record("8.8.8.8"), Err(LookupError::Unavailable)));

        let out = dir.path().join("dump.csv");
        assert!(!geo.dump("8.8.8.8", &out));
        assert!(!out.exists());

        assert_eq!(
            geo.weather_from_cookie("a=b; wx=Paris--FR|x").as_deref(),
            Some("Paris--FR")
        );
        geo.close();
    }
}
