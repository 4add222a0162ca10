use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const TASKWARRIOR_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Timestamp standing in for "never": older than any real modification.
pub fn sync_epoch() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parses Taskwarrior's compact UTC form, e.g. `20240610T080000Z`.
pub fn parse_taskwarrior(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TASKWARRIOR_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

pub fn format_taskwarrior(value: DateTime<Utc>) -> String {
    value.format(TASKWARRIOR_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taskwarrior_dates_parse_and_format() {
        let parsed = parse_taskwarrior("20240610T081500Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 6, 10, 8, 15, 0).unwrap());
        assert_eq!(format_taskwarrior(parsed), "20240610T081500Z");
        assert_eq!(parse_taskwarrior("2024-06-10"), None);
    }

    #[test]
    fn epoch_is_year_2000() {
        assert_eq!(sync_epoch().to_rfc3339(), "2000-01-01T00:00:00+00:00");
    }
}
