//! Offline auditing of lookup quality.
//!
//! Each qualifying lookup appends one comma-separated line, no header:
//!
//! ```text
//! 203.0.113.9,proxy
//! 198.51.100.4,satellite
//! 192.0.2.17,37.751000,-97.822000
//! ```
//!
//! Every line is written with a single `write_all` on a file opened in append
//! mode, so several processes can share one output file on a local POSIX
//! filesystem without interleaving lines. There is no other locking.

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};
use tracing::{debug, warn};

use crate::database::GeoSource;
use crate::value::{extract, Value};

const ANONYMOUS_PROXY: &[&str] = &["traits", "is_anonymous_proxy"];
const SATELLITE_PROVIDER: &[&str] = &["traits", "is_satellite_provider"];
const LATITUDE: &[&str] = &["location", "latitude"];
const LONGITUDE: &[&str] = &["location", "longitude"];

/// What a record says about the usefulness of its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Proxy,
    Satellite,
    Located { latitude: String, longitude: String },
    Unclassified,
}

impl Classification {
    /// The output line for `ip`, newline included, or `None` when nothing
    /// should be recorded.
    pub fn to_line(&self, ip: &str) -> Option<String> {
        match self {
            Classification::Proxy => Some(format!("{},proxy\n", ip)),
            Classification::Satellite => Some(format!("{},satellite\n", ip)),
            Classification::Located { latitude, longitude } => {
                Some(format!("{},{},{}\n", ip, latitude, longitude))
            }
            Classification::Unclassified => None,
        }
    }
}

/// Proxy and satellite flags take priority over coordinates.
pub fn classify(entry: &Value) -> Classification {
    if is_set(entry, ANONYMOUS_PROXY) {
        return Classification::Proxy;
    }
    if is_set(entry, SATELLITE_PROVIDER) {
        return Classification::Satellite;
    }

    match (extract(entry, LATITUDE), extract(entry, LONGITUDE)) {
        (Some(latitude), Some(longitude)) => Classification::Located { latitude, longitude },
        _ => Classification::Unclassified,
    }
}

fn is_set(entry: &Value, path: &[&str]) -> bool {
    extract(entry, path).as_deref() == Some("1")
}

/// Looks up `ip` and appends its classification to `output`.
///
/// Best effort: lookup failures, missing records and I/O errors are logged
/// and swallowed. Returns whether a line was written.
pub fn dump_failed_lookup<S>(source: Option<&S>, ip: &str, output: &Path) -> bool
where
    S: GeoSource + ?Sized,
{
    let Some(source) = source else {
        warn!("Dump for {} without an open database", ip);
        return false;
    };

    let entry = match source.lookup_ip(ip) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            debug!("No entry for {}, nothing to dump", ip);
            return false;
        }
        Err(e) => {
            debug!("Dump lookup for {} failed: {}", ip, e);
            return false;
        }
    };

    // Opened only once there is a line to write, so a lookup with nothing to
    // report never creates the output file.
    let Some(line) = classify(&entry).to_line(ip) else {
        return false;
    };

    match append_line(output, &line) {
        Ok(()) => true,
        Err(e) => {
            warn!("Unable to append to {:?}: {}", output, e);
            false
        }
    }
}

fn append_line(output: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(output)?;
    file.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(fields: Vec<(&str, Value)>) -> Value {
        Value::Map(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn traits(proxy: Option<bool>, satellite: Option<bool>) -> Value {
        let mut fields = Vec::new();
        if let Some(p) = proxy {
            fields.push(("is_anonymous_proxy", Value::Boolean(p)));
        }
        if let Some(s) = satellite {
            fields.push(("is_satellite_provider", Value::Boolean(s)));
        }
        map(fields)
    }

    fn location(lat: f64, lon: f64) -> Value {
        map(vec![
            ("latitude", Value::Double(lat)),
            ("longitude", Value::Double(lon)),
        ])
    }

    #[test]
    fn test_classify_priority() {
        let proxy = map(vec![
            ("traits", traits(Some(true), Some(true))),
            ("location", location(1.0, 2.0)),
        ]);
        assert_eq!(classify(&proxy), Classification::Proxy);

        let satellite = map(vec![
            ("traits", traits(Some(false), Some(true))),
            ("location", location(1.0, 2.0)),
        ]);
        assert_eq!(classify(&satellite), Classification::Satellite);

        let located = map(vec![
            ("traits", traits(Some(false), Some(false))),
            ("location", location(37.751, -97.822)),
        ]);
        assert_eq!(
            classify(&located),
            Classification::Located {
                latitude: "37.751000".to_string(),
                longitude: "-97.822000".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_unclassified() {
        assert_eq!(classify(&map(vec![])), Classification::Unclassified);

        let latitude_only = map(vec![(
            "location",
            map(vec![("latitude", Value::Double(48.85))]),
        )]);
        assert_eq!(classify(&latitude_only), Classification::Unclassified);
    }

    #[test]
    fn test_lines() {
        assert_eq!(
            Classification::Proxy.to_line("1.2.3.4").as_deref(),
            Some("1.2.3.4,proxy\n")
        );
        assert_eq!(
            Classification::Satellite.to_line("1.2.3.4").as_deref(),
            Some("1.2.3.4,satellite\n")
        );
        assert_eq!(Classification::Unclassified.to_line("1.2.3.4"), None);
    }
}
