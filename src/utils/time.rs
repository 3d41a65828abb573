use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Persisted timestamp layout. UTC, second precision, so lexical order is
/// chronological order in both backends.
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

pub fn now() -> DateTime<Utc> {
    truncate_to_seconds(Utc::now())
}

pub fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(STORAGE_FORMAT).to_string()
}

/// Parses the ISO-8601 forms accepted for expirations. Offsets are converted
/// to UTC, naive values are taken as UTC, and a bare date means midnight.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(truncate_to_seconds(at.with_timezone(&Utc)));
    }

    for format in NAIVE_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(value, format) {
            return Some(truncate_to_seconds(at.and_utc()));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_accepted_forms() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

        assert_eq!(parse_timestamp("2030-01-02T03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2030-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2030-01-02T03:04:05.789"), Some(expected));
        assert_eq!(parse_timestamp("2030-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2030-01-02T05:04:05+02:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2030-01-02T03:04"),
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2030-01-02"),
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp("not-a-date"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("2030-13-45"), None);
    }

    #[test]
    fn test_format_roundtrip_keeps_seconds() {
        let at = Utc.with_ymd_and_hms(2031, 6, 7, 8, 9, 10).unwrap();
        let text = format_timestamp(&at);
        assert_eq!(text, "2031-06-07T08:09:10");
        assert_eq!(parse_timestamp(&text), Some(at));
    }

    #[test]
    fn test_now_has_no_subsecond_part() {
        assert_eq!(now().nanosecond(), 0);
    }
}
