/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Parse an RFC 3339 / ISO-8601 timestamp into Unix millis.
///
/// Catalog timestamps such as `date_modified_gmt` omit the offset; those are read as UTC.
pub fn parse_timestamp_millis(value: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_timestamps() {
        assert_eq!(
            parse_timestamp_millis("2024-01-01T00:00:00"),
            Some(1_704_067_200_000)
        );
        assert_eq!(
            parse_timestamp_millis("2024-01-01T01:00:00+01:00"),
            Some(1_704_067_200_000)
        );
        assert_eq!(parse_timestamp_millis("yesterday"), None);
    }
}
