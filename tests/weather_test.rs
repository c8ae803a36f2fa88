// Request-path behavior through the public API: cookie shortcut first, then
// a database lookup shared across worker threads.

use geo_weather::{
    get_weather_code_from_cookie, lookup_weather, GeoSource, LookupError, Value,
    DEFAULT_WEATHER_CODE,
};
use std::{collections::HashMap, sync::Arc, thread};

struct MemorySource(HashMap<&'static str, Value>);

impl GeoSource for MemorySource {
    fn lookup_ip(&self, ip: &str) -> Result<Option<Value>, LookupError> {
        Ok(self.0.get(ip).cloned())
    }
}

fn text(s: &str) -> Value {
    Value::Utf8String(s.to_string())
}

fn map(fields: Vec<(&str, Value)>) -> Value {
    Value::Map(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn source() -> MemorySource {
    MemorySource(HashMap::from([
        (
            "81.2.69.142",
            map(vec![
                ("city", map(vec![("names", map(vec![("en", text("London"))]))])),
                ("country", map(vec![("iso_code", text("GB"))])),
                ("subdivisions", Value::Array(vec![map(vec![("iso_code", text("ENG"))])])),
            ]),
        ),
        (
            "216.160.83.56",
            map(vec![
                ("city", map(vec![("names", map(vec![("en", text("Milton"))]))])),
                ("country", map(vec![("iso_code", text("US"))])),
                ("subdivisions", Value::Array(vec![map(vec![("iso_code", text("WA"))])])),
            ]),
        ),
    ]))
}

fn weather_for_request(source: &MemorySource, cookie_header: &str, ip: &str) -> String {
    get_weather_code_from_cookie(cookie_header, "wx")
        .unwrap_or_else(|| lookup_weather(Some(source), ip, true))
}

#[test]
fn test_cookie_takes_precedence_over_lookup() {
    let src = source();
    assert_eq!(
        weather_for_request(&src, "sid=9; wx=MiltonWAUS|2026", "81.2.69.142"),
        "MiltonWAUS"
    );
    assert_eq!(
        weather_for_request(&src, "sid=9; wx=ParisIDF--FR|x", "81.2.69.142"),
        "ParisIDF--FR"
    );
    assert_eq!(weather_for_request(&src, "sid=9", "81.2.69.142"), "London--GB");
    assert_eq!(weather_for_request(&src, "wx=", "10.0.0.1"), DEFAULT_WEATHER_CODE);
}

#[test]
fn test_shared_source_across_threads() {
    let src = Arc::new(source());

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let src = Arc::clone(&src);
            thread::spawn(move || {
                let ip = if i % 2 == 0 { "216.160.83.56" } else { "81.2.69.142" };
                (0..100)
                    .map(|_| lookup_weather(Some(src.as_ref()), ip, false))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for (i, worker) in workers.into_iter().enumerate() {
        let expected = if i % 2 == 0 { "MiltonWAUS" } else { "London--GB" };
        let codes = worker.join().unwrap();
        assert!(codes.iter().all(|code| code == expected));
    }
}
