//! IP geolocation lookups for a caching proxy's request path.
//!
//! Given a client address, a MaxMind City database yields a weather code,
//! `<city><region><country>`, used to pick region-specific content. A code
//! issued earlier can be read back from a cookie instead, and a diagnostic
//! dumper records lookups that fail to produce usable coordinates.
//!
//! ```no_run
//! use geo_weather::{Config, Geo};
//!
//! let geo = Geo::open(&Config::from_env());
//! let code = geo
//!     .weather_from_cookie("session=1; wx=Paris--FR|v2")
//!     .unwrap_or_else(|| geo.weather("81.2.69.142"));
//! println!("{}", code);
//! ```

pub mod config;
pub mod cookie;
pub mod database;
pub mod dump;
pub mod value;
pub mod weather;

pub use config::{Config, Geo};
pub use cookie::{get_cookie, get_weather_code_from_cookie};
pub use database::{close, DatabaseHandle, GeoSource, LookupError, OpenError};
pub use dump::{classify, dump_failed_lookup, Classification};
pub use value::{extract, Resolved, Value};
pub use weather::{lookup_field, lookup_name, lookup_weather, DEFAULT_WEATHER_CODE, PLACEHOLDER};
