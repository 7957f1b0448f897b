use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the data directory (policy, speed log, videos) exists.
pub fn ensure_data_dir(data_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("cannot create data directory {}", data_dir.display()))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Log file used when the terminal display owns the screen and no
/// `--log-file` was given.
pub const TUI_LOG_FILE_NAME: &str = "speedsign.log";

/// Where log output should go.
///
/// An explicit `log_file` always wins. With the terminal display active,
/// stderr would draw over the alternate screen, so logs go to
/// [`TUI_LOG_FILE_NAME`] inside `data_dir` instead.
pub fn resolve_log_file(
    log_file: Option<&PathBuf>,
    terminal_ui: bool,
    data_dir: &Path,
) -> Option<PathBuf> {
    match log_file {
        Some(path) => Some(path.clone()),
        None if terminal_ui => Some(data_dir.join(TUI_LOG_FILE_NAME)),
        None => None,
    }
}

/// Map a CLI log level to an [`EnvFilter`] directive.
pub fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber.
///
/// With `log_file` set, output is appended to that file without colours so
/// the speed display keeps the terminal to itself; otherwise it goes to
/// stderr.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = log_file.is_none().then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_data_dir_creates_nested() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("datalogs_speedsign").join("nested");

        ensure_data_dir(&dir).expect("ensure_data_dir should succeed");

        assert!(dir.is_dir());
    }

    #[test]
    fn test_ensure_data_dir_existing_is_ok() {
        let tmp = TempDir::new().expect("tempdir");
        ensure_data_dir(tmp.path()).expect("existing dir");
    }

    #[test]
    fn test_filter_directive_mapping() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("info"), "info");
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("ERROR"), "error");
        assert_eq!(filter_directive("CRITICAL"), "error");
        assert_eq!(filter_directive("bogus"), "info");
    }

    #[test]
    fn test_resolve_log_file_explicit_path_wins() {
        let explicit = PathBuf::from("/var/log/speedsign.log");
        let resolved = resolve_log_file(Some(&explicit), true, Path::new("/data"));
        assert_eq!(resolved, Some(explicit));
    }

    #[test]
    fn test_resolve_log_file_tui_keeps_stderr_clear() {
        let resolved = resolve_log_file(None, true, Path::new("/data"));
        assert_eq!(resolved, Some(PathBuf::from("/data/speedsign.log")));
    }

    #[test]
    fn test_resolve_log_file_console_uses_stderr() {
        assert_eq!(resolve_log_file(None, false, Path::new("/data")), None);
    }
}
