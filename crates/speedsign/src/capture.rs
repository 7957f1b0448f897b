//! RTSP recording through an external `ffmpeg` process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use speedsign_core::error::{Result, SignError};
use speedsign_runtime::collaborators::VideoCapture;
use tracing::{debug, info, warn};

/// Starts one detached `ffmpeg` per session.
///
/// The stream is copied without re-encoding and ffmpeg stops itself after
/// the requested duration. The child is reaped on a background thread; its
/// exit status is only logged.
pub struct FfmpegCapture {
    program: PathBuf,
    url: String,
    output_dir: PathBuf,
}

impl FfmpegCapture {
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            url: url.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Use a specific ffmpeg binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments for recording `duration_secs` of the stream into `output`.
    pub fn command_args(&self, output: &Path, duration_secs: u64) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            "error",
            "-rtsp_transport",
            "tcp",
            "-i",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(OsString::from(&self.url));
        for arg in ["-c", "copy", "-t"] {
            args.push(OsString::from(arg));
        }
        args.push(OsString::from(duration_secs.to_string()));
        for arg in [
            "-use_wallclock_as_timestamps",
            "1",
            "-reset_timestamps",
            "1",
            "-flags",
            "+global_header",
        ] {
            args.push(OsString::from(arg));
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl VideoCapture for FfmpegCapture {
    fn start_capture(&mut self, session_id: &str, duration_secs: u64) -> Result<()> {
        let output = self.output_dir.join(session_id);
        let mut child = Command::new(&self.program)
            .args(self.command_args(&output, duration_secs))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SignError::Device(format!("failed to start {}: {e}", self.program.display()))
            })?;

        info!(session_id, duration_secs, pid = child.id(), "recording started");

        let session_id = session_id.to_string();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if status.success() => debug!(session_id = %session_id, "recording finished"),
            Ok(status) => warn!(session_id = %session_id, %status, "ffmpeg exited with failure"),
            Err(e) => warn!(session_id = %session_id, error = %e, "failed to wait for ffmpeg"),
        });
        Ok(())
    }
}
