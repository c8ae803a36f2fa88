//! Weather-code synthesis.
//!
//! A weather code is `<city><region><country>` with no separators, the key
//! format used by the weather-content provider, e.g. `Beverly HillsCAUS` or
//! `Paris--FR`. Only US addresses carry a region.

use tracing::{debug, warn};

use crate::database::{GeoSource, LookupError};
use crate::value::extract;

/// Returned when a location cannot be determined and defaulting is enabled.
pub const DEFAULT_WEATHER_CODE: &str = "New YorkNYUS";

/// Stands in for a missing field, or for the whole code when a lookup fails
/// and defaulting is disabled.
pub const PLACEHOLDER: &str = "--";

pub const COUNTRY_ISO_CODE: &[&str] = &["country", "iso_code"];
pub const CITY_NAME: &[&str] = &["city", "names", "en"];
pub const REGION_ISO_CODE: &[&str] = &["subdivisions", "0", "iso_code"];

const REGION_COUNTRY: &str = "US";

/// Derives the weather code for `ip`. Never fails.
///
/// Without a source the default code is returned. Address and database
/// errors yield the default code when `use_default` is set and
/// [`PLACEHOLDER`] otherwise. An address with no record always gets the
/// default code. When a record lacks a field, `use_default` selects between
/// the default code and substituting [`PLACEHOLDER`] for each missing field.
pub fn lookup_weather<S>(source: Option<&S>, ip: &str, use_default: bool) -> String
where
    S: GeoSource + ?Sized,
{
    let Some(source) = source else {
        warn!("Weather lookup for {} without an open database", ip);
        return DEFAULT_WEATHER_CODE.to_string();
    };

    let entry = match source.lookup_ip(ip) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            debug!("No entry for {}, using default weather code", ip);
            return DEFAULT_WEATHER_CODE.to_string();
        }
        Err(e) => {
            debug!("Weather lookup for {} failed: {}", ip, e);
            return if use_default {
                DEFAULT_WEATHER_CODE.to_string()
            } else {
                PLACEHOLDER.to_string()
            };
        }
    };

    let country = extract(&entry, COUNTRY_ISO_CODE);
    let city = extract(&entry, CITY_NAME);
    let region = match country.as_deref() {
        Some(REGION_COUNTRY) => extract(&entry, REGION_ISO_CODE),
        _ => Some(PLACEHOLDER.to_string()),
    };

    match (city, region, country) {
        (Some(city), Some(region), Some(country)) => assemble(&city, &region, &country),
        _ if use_default => {
            debug!("Partial record for {}, using default weather code", ip);
            DEFAULT_WEATHER_CODE.to_string()
        }
        (city, region, country) => assemble(
            city.as_deref().unwrap_or(PLACEHOLDER),
            region.as_deref().unwrap_or(PLACEHOLDER),
            country.as_deref().unwrap_or(PLACEHOLDER),
        ),
    }
}

fn assemble(city: &str, region: &str, country: &str) -> String {
    let mut code = String::with_capacity(city.len() + region.len() + country.len());
    code.push_str(city);
    code.push_str(region);
    code.push_str(country);
    code
}

/// Looks up `ip` and extracts a single field along `path`.
///
/// Every failure, including a missing source, is reported as `None`; callers
/// apply their own fallback.
pub fn lookup_field<S>(source: Option<&S>, ip: &str, path: &[&str]) -> Option<String>
where
    S: GeoSource + ?Sized,
{
    let source = source?;
    match source.lookup_ip(ip) {
        Ok(Some(entry)) => extract(&entry, path),
        Ok(None) => None,
        Err(LookupError::Address(_)) => {
            debug!("Cannot look up {}: not an IP address", ip);
            None
        }
        Err(e) => {
            debug!("Field lookup for {} failed: {}", ip, e);
            None
        }
    }
}

/// English name of the `kind` place (`city`, `country`, `continent`, ...)
/// recorded for `ip`.
pub fn lookup_name<S>(source: Option<&S>, ip: &str, kind: &str) -> Option<String>
where
    S: GeoSource + ?Sized,
{
    lookup_field(source, ip, &[kind, "names", "en"])
}
