//! Serde adapter for vault timestamps.
//!
//! Writes RFC 3339 in UTC. Reads RFC 3339 or a naive ISO 8601 date-time
//! without offset, which is taken to be UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Current time at the precision vault files store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a timestamp the way vault files store it.
pub fn format(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
}

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(dt))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse("2024-03-01T10:15:30.250000Z").unwrap();
        assert_eq!(dt.timestamp_millis(), 1_709_288_130_250);

        let offset = parse("2024-03-01T11:15:30+01:00").unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap());
    }

    #[test]
    fn test_parse_naive_iso() {
        let with_fraction = parse("2024-03-01T10:15:30.123456").unwrap();
        assert_eq!(with_fraction.timestamp_subsec_micros(), 123_456);

        let whole = parse("2024-03-01T10:15:30").unwrap();
        assert_eq!(whole, Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }

    #[test]
    fn test_now_survives_format() {
        let stamp = now();
        assert_eq!(parse(&format(&stamp)).unwrap(), stamp);
    }

    #[test]
    fn test_format_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format(&dt), "2025-12-31T23:59:59.000000Z");
        assert_eq!(parse(&format(&dt)).unwrap(), dt);
    }
}
