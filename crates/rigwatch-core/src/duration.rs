//! Human-readable duration strings used throughout the config.

use std::time::Duration;

/// Parse a duration string like "5s", "500ms", "2m".
///
/// A plain number is read as seconds. Returns `None` for anything else.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Parse with a fallback for malformed or missing values.
pub fn duration_or(s: Option<&str>, default: Duration) -> Duration {
    s.and_then(parse_duration).unwrap_or(default)
}
