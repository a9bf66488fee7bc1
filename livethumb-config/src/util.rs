use std::time::Duration;

use crate::error::ConfigLoadError;

/// Parse a boolean value from a raw string, accepting common env-style forms.
///
/// Accepted truthy values (case-insensitive): `"1"`, `"true"`, `"yes"`, `"on"`.
/// Accepted falsy values: `"0"`, `"false"`, `"no"`, `"off"`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Flag semantics: setting the key turns the option on unless the value is
/// an explicit falsy literal.
pub fn presence_flag(raw: Option<&str>) -> Option<bool> {
    raw.map(|value| parse_bool(value).unwrap_or(true))
}

pub fn parse_number<T>(
    key: &'static str,
    raw: Option<&str>,
) -> Result<Option<T>, ConfigLoadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|err| ConfigLoadError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: err.to_string(),
        })
}

/// Durations accept humantime syntax (`500ms`, `2s`, `1m 30s`) or a bare
/// number of seconds (`0.5`).
pub fn parse_duration(
    key: &'static str,
    raw: Option<&str>,
) -> Result<Option<Duration>, ConfigLoadError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    if let Ok(secs) = raw.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map(Some).map_err(|err| {
            ConfigLoadError::InvalidValue {
                key,
                value: raw.to_string(),
                reason: err.to_string(),
            }
        });
    }
    humantime::parse_duration(raw)
        .map(Some)
        .map_err(|err| ConfigLoadError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: err.to_string(),
        })
}

/// Empty strings count as unset.
pub fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_flag_defaults_to_on() {
        assert_eq!(presence_flag(None), None);
        assert_eq!(presence_flag(Some("")), Some(true));
        assert_eq!(presence_flag(Some("anything")), Some(true));
        assert_eq!(presence_flag(Some("False")), Some(false));
        assert_eq!(presence_flag(Some("0")), Some(false));
    }

    #[test]
    fn numbers_name_the_key_on_failure() {
        assert_eq!(parse_number::<u16>("HTTP_PORT", Some("8080")).unwrap(), Some(8080));
        assert_eq!(parse_number::<u16>("HTTP_PORT", Some(" ")).unwrap(), None);
        let err = parse_number::<u16>("HTTP_PORT", Some("eighty")).unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));
    }

    #[test]
    fn durations_accept_humantime_and_seconds() {
        assert_eq!(
            parse_duration("T", Some("500ms")).unwrap(),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            parse_duration("T", Some("0.5")).unwrap(),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            parse_duration("T", Some("2")).unwrap(),
            Some(Duration::from_secs(2))
        );
        assert!(parse_duration("T", Some("-1")).is_err());
        assert!(parse_duration("T", Some("soon")).is_err());
    }
}
