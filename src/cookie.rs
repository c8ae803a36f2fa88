//! Cookie header parsing for weather-code shortcuts.

/// Separates the weather code from auxiliary data in the weather cookie.
pub const WEATHER_CODE_SEPARATOR: char = '|';

/// Returns the value of the first `name=value` pair in a raw `Cookie` header.
///
/// A match must be followed by `=`, optionally after whitespace, so `lang`
/// does not match `language=xx`. What precedes the name is not checked:
/// `mylang=xx` yields `xx`. The value ends at `;`, a space, or the end of
/// the header. An empty value counts as no value.
pub fn get_cookie(header: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    let bytes = header.as_bytes();
    let mut from = 0;

    while let Some(offset) = header[from..].find(name) {
        let mut pos = from + offset + name.len();
        from = pos;

        while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'=') {
            continue;
        }

        let value = &header[pos + 1..];
        let end = value.find(|c: char| c == ';' || c == ' ').unwrap_or(value.len());
        if end == 0 {
            return None;
        }
        return Some(value[..end].to_string());
    }

    None
}

/// Reads the weather code from cookie `name`, dropping anything after the
/// first [`WEATHER_CODE_SEPARATOR`].
///
/// A cookie whose value starts with the separator carries no code and yields
/// `None`, the same as an empty cookie value.
pub fn get_weather_code_from_cookie(header: &str, name: &str) -> Option<String> {
    let mut value = get_cookie(header, name)?;
    if let Some(idx) = value.find(WEATHER_CODE_SEPARATOR) {
        value.truncate(idx);
    }
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
