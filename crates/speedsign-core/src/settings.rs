use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::PolicyUpdate;
use crate::time_utils::log_file_name;

/// Name of the persisted policy file inside the data directory.
pub const POLICY_FILE_NAME: &str = "config.json";

/// Data directory used when `--data-dir` is not given (relative to `$HOME`).
pub const DEFAULT_DATA_DIR_NAME: &str = "datalogs_speedsign";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Radar speed sign with triggered video recording
#[derive(Parser, Debug, Clone)]
#[command(
    name = "speedsign",
    about = "Radar speed sign with triggered video recording",
    version
)]
pub struct Settings {
    /// Directory holding the policy file, the speed log and recorded videos
    #[arg(long, env = "SPEEDSIGN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Serial device the radar is attached to
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub device: String,

    /// Serial baud rate
    #[arg(long, default_value = "9600")]
    pub baud_rate: u32,

    /// Sensor read timeout in milliseconds (10-1000)
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(10..=1000))]
    pub read_timeout_ms: u64,

    /// Seconds between policy reloads (1-3600)
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub config_interval: u64,

    /// Speeds this far below the limit are still logged
    #[arg(long, default_value = "10")]
    pub near_limit_margin: u32,

    /// Station identifier used in video and log file names
    #[arg(long, default_value = "SAM01")]
    pub station_id: String,

    /// RTSP stream to record when the limit is exceeded (recording disabled if absent)
    #[arg(long, env = "SPEEDSIGN_CAMERA_URL")]
    pub camera_url: Option<String>,

    /// Sysfs GPIO number driving the alert relay (relay disabled if absent)
    #[arg(long)]
    pub relay_gpio: Option<u32>,

    /// Speed display
    #[arg(long, default_value = "console", value_parser = ["console", "tui", "none"])]
    pub display: String,

    /// What to do: run the sign, print the recorded sessions, or print the status
    #[arg(long, default_value = "run", value_parser = ["run", "report", "status"])]
    pub view: String,

    /// Store a new speed limit (km/h) and exit; a running sign applies it on its next reload
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub set_speed_limit: Option<u32>,

    /// Store a new recording cooldown (seconds) and exit
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub set_record: Option<u32>,

    /// After a report, delete the reported videos and clear the log
    #[arg(long)]
    pub purge: bool,

    /// Seconds to wait before a purge is carried out
    #[arg(long, default_value = "10")]
    pub cleanup_delay: u64,

    /// Clear the speed log and exit
    #[arg(long)]
    pub clear: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path (logs go to stderr when absent)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and resolve derived values.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve(Settings::parse_from(args))
    }

    /// Apply the `--debug` override and fill in the default data directory.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        if settings.data_dir.is_none() {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            settings.data_dir = Some(home.join(DEFAULT_DATA_DIR_NAME));
        }
        settings
    }

    /// The resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR_NAME))
    }

    /// Path of the persisted policy file.
    pub fn policy_path(&self) -> PathBuf {
        self.data_dir().join(POLICY_FILE_NAME)
    }

    /// Path of the speed log for this station.
    pub fn event_log_path(&self) -> PathBuf {
        self.data_dir().join(log_file_name(&self.station_id))
    }

    /// Sensor read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Policy reload interval.
    pub fn config_interval(&self) -> Duration {
        Duration::from_secs(self.config_interval)
    }

    /// The policy change requested on the command line, if any.
    pub fn policy_update(&self) -> Option<PolicyUpdate> {
        if self.set_speed_limit.is_none() && self.set_record.is_none() {
            return None;
        }
        Some(PolicyUpdate {
            speed_limit: self.set_speed_limit,
            cooldown_seconds: self.set_record,
        })
    }

    /// Delay before a scheduled purge runs.
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
