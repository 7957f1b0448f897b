//! Session report: joins log entries with the recorded videos on disk.
//!
//! Rows are ordered newest video first. Each video contributes one row per
//! log entry that references it, or a single bare row when no entry does.
//! Entries whose video never appeared (capture failed) follow, then the
//! entries logged without a session.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use speedsign_core::models::{LogEntry, SessionRef};
use speedsign_core::time_utils::{parse_session_name, ARTIFACT_EXTENSION};
use tracing::{debug, warn};

use crate::event_log::EventLog;

// ── ReportRow ─────────────────────────────────────────────────────────────────

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    /// The session reference (video name or sentinel).
    pub session_ref: SessionRef,
    /// Path of the recorded video, when it exists on disk.
    pub artifact: Option<PathBuf>,
    /// Session start recovered from the video name, when parseable.
    pub started_at: Option<NaiveDateTime>,
    /// Logged speed, `None` for a video with no log entries.
    pub speed: Option<u32>,
    /// Logged timestamp, `None` for a video with no log entries.
    pub timestamp: Option<String>,
}

// ── ReportTotals ──────────────────────────────────────────────────────────────

/// Summary figures across the whole report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTotals {
    /// Log entries included in the report.
    pub entries: usize,
    /// Distinct sessions referenced by the log.
    pub sessions: usize,
    /// Entries logged without a session.
    pub unrecorded_entries: usize,
    /// Videos on disk that no log entry references.
    pub orphan_artifacts: usize,
    /// Sessions referenced by the log whose video is missing.
    pub missing_artifacts: usize,
    /// Highest logged speed.
    pub max_speed: Option<u32>,
}

/// Complete report.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub rows: Vec<ReportRow>,
    pub totals: ReportTotals,
}

impl SessionReport {
    /// Videos referenced by the report's rows.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|r| r.artifact.clone())
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }
}

// ── Artifact discovery ────────────────────────────────────────────────────────

/// Find all recorded videos directly inside `dir`, sorted newest name first.
pub fn find_artifacts(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Data directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == ARTIFACT_EXTENSION)
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files.reverse();
    files
}

// ── Report building ───────────────────────────────────────────────────────────

/// Build a report from log `entries` and video `artifacts`.
pub fn build_report(entries: &[LogEntry], artifacts: &[PathBuf]) -> SessionReport {
    // session id -> entries, in log order
    let mut by_session: BTreeMap<&str, Vec<&LogEntry>> = BTreeMap::new();
    let mut unrecorded: Vec<&LogEntry> = Vec::new();
    for entry in entries {
        match entry.session_ref.session_id() {
            Some(id) => by_session.entry(id).or_default().push(entry),
            None => unrecorded.push(entry),
        }
    }

    let mut rows = Vec::new();
    let mut totals = ReportTotals {
        entries: entries.len(),
        sessions: by_session.len(),
        unrecorded_entries: unrecorded.len(),
        max_speed: entries.iter().map(|e| e.speed).max(),
        ..ReportTotals::default()
    };

    let mut matched: HashSet<&str> = HashSet::new();
    for path in artifacts {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let started_at = parse_session_name(name).map(|a| a.started_at);
        let session_ref = SessionRef::Session(name.to_string());

        match by_session.get(name) {
            Some(list) => {
                matched.insert(name);
                rows.extend(list.iter().map(|e| ReportRow {
                    session_ref: session_ref.clone(),
                    artifact: Some(path.clone()),
                    started_at,
                    speed: Some(e.speed),
                    timestamp: Some(e.timestamp.clone()),
                }));
            }
            None => {
                totals.orphan_artifacts += 1;
                rows.push(ReportRow {
                    session_ref,
                    artifact: Some(path.clone()),
                    started_at,
                    speed: None,
                    timestamp: None,
                });
            }
        }
    }

    // Newest session first, matching the artifact ordering above.
    for (id, list) in by_session.iter().rev() {
        if matched.contains(id) {
            continue;
        }
        totals.missing_artifacts += 1;
        debug!(session_id = id, "logged session has no video on disk");
        let started_at = parse_session_name(id).map(|a| a.started_at);
        rows.extend(list.iter().map(|e| ReportRow {
            session_ref: e.session_ref.clone(),
            artifact: None,
            started_at,
            speed: Some(e.speed),
            timestamp: Some(e.timestamp.clone()),
        }));
    }

    rows.extend(unrecorded.into_iter().map(|e| ReportRow {
        session_ref: SessionRef::NoSession,
        artifact: None,
        started_at: None,
        speed: Some(e.speed),
        timestamp: Some(e.timestamp.clone()),
    }));

    SessionReport { rows, totals }
}

/// Read the log and scan `data_dir`, then build the report.
pub fn collect_report(data_dir: &Path, log: &EventLog) -> SessionReport {
    let entries = log.read_all();
    let artifacts = find_artifacts(data_dir);
    build_report(&entries, &artifacts)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    const S1: &str = "SAM01_record_20240301_120000.mp4";
    const S2: &str = "SAM01_record_20240301_120011.mp4";
    const S3: &str = "SAM01_record_20240301_130000.mp4";

    fn entry(sec: u32, speed: u32, video: Option<&str>) -> LogEntry {
        let at = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, sec).unwrap();
        let session_ref = match video {
            Some(v) => SessionRef::Session(v.to_string()),
            None => SessionRef::NoSession,
        };
        LogEntry::new(at, speed, session_ref)
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    // ── find_artifacts ────────────────────────────────────────────────────────

    #[test]
    fn test_find_artifacts_newest_first_and_filtered() {
        let tmp = TempDir::new().expect("tempdir");
        touch(tmp.path(), S1);
        touch(tmp.path(), S2);
        touch(tmp.path(), "config.json");
        touch(tmp.path(), "SAM01_speed_log.json");

        let found = find_artifacts(tmp.path());

        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec![S2.to_string(), S1.to_string()]);
    }

    #[test]
    fn test_find_artifacts_missing_dir() {
        assert!(find_artifacts(Path::new("/definitely/not/here")).is_empty());
    }

    // ── build_report ──────────────────────────────────────────────────────────

    #[test]
    fn test_report_groups_entries_under_their_video() {
        let tmp = TempDir::new().expect("tempdir");
        let a1 = touch(tmp.path(), S1);
        let a2 = touch(tmp.path(), S2);
        let entries = vec![
            entry(0, 70, Some(S1)),
            entry(5, 80, Some(S1)),
            entry(8, 52, None),
            entry(11, 81, Some(S2)),
        ];

        let report = build_report(&entries, &[a2.clone(), a1.clone()]);

        let speeds: Vec<Option<u32>> = report.rows.iter().map(|r| r.speed).collect();
        assert_eq!(speeds, vec![Some(81), Some(70), Some(80), Some(52)]);
        assert_eq!(report.rows[0].artifact.as_ref(), Some(&a2));
        assert_eq!(report.rows[1].artifact.as_ref(), Some(&a1));
        assert_eq!(report.rows[3].session_ref, SessionRef::NoSession);
        assert!(report.rows[1].started_at.is_some());

        assert_eq!(report.totals.entries, 4);
        assert_eq!(report.totals.sessions, 2);
        assert_eq!(report.totals.unrecorded_entries, 1);
        assert_eq!(report.totals.max_speed, Some(81));
        assert_eq!(report.totals.orphan_artifacts, 0);
        assert_eq!(report.totals.missing_artifacts, 0);
    }

    #[test]
    fn test_report_video_without_entries_gets_bare_row() {
        let tmp = TempDir::new().expect("tempdir");
        let a3 = touch(tmp.path(), S3);

        let report = build_report(&[], &[a3.clone()]);

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].artifact, Some(a3));
        assert!(report.rows[0].speed.is_none());
        assert_eq!(report.totals.orphan_artifacts, 1);
        assert!(report.totals.max_speed.is_none());
    }

    #[test]
    fn test_report_keeps_entries_whose_video_is_missing() {
        let entries = vec![entry(0, 70, Some(S1))];

        let report = build_report(&entries, &[]);

        assert_eq!(report.rows.len(), 1);
        assert!(report.rows[0].artifact.is_none());
        assert_eq!(report.rows[0].session_ref, SessionRef::Session(S1.to_string()));
        assert_eq!(report.totals.missing_artifacts, 1);
    }

    #[test]
    fn test_report_artifacts_are_deduplicated() {
        let tmp = TempDir::new().expect("tempdir");
        let a1 = touch(tmp.path(), S1);
        let entries = vec![entry(0, 70, Some(S1)), entry(1, 71, Some(S1))];

        let report = build_report(&entries, &[a1.clone()]);

        assert_eq!(report.artifacts(), vec![a1]);
    }

    // ── collect_report ────────────────────────────────────────────────────────

    #[test]
    fn test_collect_report_reads_log_and_dir() {
        let tmp = TempDir::new().expect("tempdir");
        touch(tmp.path(), S1);
        let log = EventLog::new(tmp.path().join("SAM01_speed_log.json"));
        log.append(&entry(0, 66, Some(S1))).unwrap();

        let report = collect_report(tmp.path(), &log);

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].speed, Some(66));
        assert!(report.rows[0].artifact.is_some());
    }
}
