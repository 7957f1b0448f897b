use chrono::{DateTime, Local, NaiveDateTime};
use regex::Regex;
use tracing::debug;

// ── Formats ───────────────────────────────────────────────────────────────────

/// Timestamp format written into every log entry.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format embedded in session (artifact) names.
pub const SESSION_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// File extension of recorded artifacts.
pub const ARTIFACT_EXTENSION: &str = "mp4";

// ── Log timestamps ────────────────────────────────────────────────────────────

/// Format `at` the way log entries store it, e.g. `"2024-03-01 14:05:09"`.
pub fn format_log_timestamp(at: DateTime<Local>) -> String {
    at.format(LOG_TIMESTAMP_FORMAT).to_string()
}

/// Parse a log-entry timestamp back into a naive local datetime.
///
/// Returns `None` for anything that is not in [`LOG_TIMESTAMP_FORMAT`].
pub fn parse_log_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), LOG_TIMESTAMP_FORMAT).ok()
}

// ── Session names ─────────────────────────────────────────────────────────────

/// Build the session identifier for a session starting at `started_at`.
///
/// The identifier doubles as the video file name:
/// `"{station}_record_{%Y%m%d_%H%M%S}.mp4"`.
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use speedsign_core::time_utils::session_name;
///
/// let at = Local.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
/// assert_eq!(session_name("SAM01", at), "SAM01_record_20240301_140509.mp4");
/// ```
pub fn session_name(station: &str, started_at: DateTime<Local>) -> String {
    format!(
        "{}_record_{}.{}",
        station,
        started_at.format(SESSION_STAMP_FORMAT),
        ARTIFACT_EXTENSION
    )
}

/// Components recovered from a session (artifact) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    /// Station identifier prefix, e.g. `"SAM01"`.
    pub station: String,
    /// Local wall-clock time the session started.
    pub started_at: NaiveDateTime,
}

/// Parse a name produced by [`session_name`].
///
/// Returns `None` for file names that do not follow the pattern, so callers
/// can skip unrelated files in the data directory.
pub fn parse_session_name(name: &str) -> Option<ArtifactName> {
    let re = Regex::new(r"^(?P<station>.+)_record_(?P<stamp>\d{8}_\d{6})\.mp4$")
        .expect("regex is valid");
    let caps = re.captures(name)?;
    let stamp = &caps["stamp"];
    match NaiveDateTime::parse_from_str(stamp, SESSION_STAMP_FORMAT) {
        Ok(started_at) => Some(ArtifactName {
            station: caps["station"].to_string(),
            started_at,
        }),
        Err(e) => {
            debug!(name, error = %e, "session name has an impossible timestamp");
            None
        }
    }
}

// ── File names ────────────────────────────────────────────────────────────────

/// Name of the event log file for `station`, e.g. `"SAM01_speed_log.json"`.
pub fn log_file_name(station: &str) -> String {
    format!("{station}_speed_log.json")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    // ── log timestamps ────────────────────────────────────────────────────────

    #[test]
    fn test_format_log_timestamp() {
        assert_eq!(format_log_timestamp(at(14, 5, 9)), "2024-03-01 14:05:09");
    }

    #[test]
    fn test_parse_log_timestamp() {
        let parsed = parse_log_timestamp("2024-03-01 14:05:09").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_log_timestamp_rejects_other_formats() {
        assert!(parse_log_timestamp("2024-03-01T14:05:09Z").is_none());
        assert!(parse_log_timestamp("").is_none());
    }

    // ── session names ─────────────────────────────────────────────────────────

    #[test]
    fn test_session_name_format() {
        assert_eq!(
            session_name("SAM01", at(0, 0, 1)),
            "SAM01_record_20240301_000001.mp4"
        );
    }

    #[test]
    fn test_session_names_differ_per_second() {
        assert_ne!(
            session_name("SAM01", at(10, 0, 0)),
            session_name("SAM01", at(10, 0, 11))
        );
    }

    #[test]
    fn test_parse_session_name_recovers_components() {
        let name = session_name("NORTH_GATE", at(23, 59, 58));
        let parsed = parse_session_name(&name).unwrap();
        assert_eq!(parsed.station, "NORTH_GATE");
        assert_eq!(parsed.started_at, at(23, 59, 58).naive_local());
    }

    #[test]
    fn test_parse_session_name_rejects_unrelated_files() {
        assert!(parse_session_name("SAM01_speed_log.json").is_none());
        assert!(parse_session_name("config.json").is_none());
        assert!(parse_session_name("SAM01_record_2024_1.mp4").is_none());
    }

    #[test]
    fn test_parse_session_name_rejects_impossible_dates() {
        assert!(parse_session_name("SAM01_record_20241399_250000.mp4").is_none());
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name("SAM01"), "SAM01_speed_log.json");
    }
}
