//! Device adapters: the serial radar and the sysfs GPIO relay.

use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use speedsign_core::error::{Result, SignError};
use speedsign_core::frame::FRAME_LEN;
use speedsign_runtime::collaborators::{FrameSource, Relay};
use tracing::{debug, info};

// ── Radar ─────────────────────────────────────────────────────────────────────

/// Reads fixed-length radar frames from a byte stream whose reads time out.
pub struct FrameReader<R: Read + Send> {
    inner: R,
}

impl<R: Read + Send> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> FrameSource for FrameReader<R> {
    /// Collect up to one frame's worth of bytes before `timeout` runs out.
    ///
    /// A partial frame is returned as-is; validation is the caller's job.
    fn read_frame(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; FRAME_LEN];
        let mut filled = 0;

        while filled < FRAME_LEN && Instant::now() < deadline {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            Ok(None)
        } else {
            Ok(Some(buf[..filled].to_vec()))
        }
    }
}

/// Radar attached to a serial port.
pub type SerialFrameSource = FrameReader<Box<dyn serialport::SerialPort>>;

/// Open the radar's serial port.
pub fn open_serial(device: &str, baud_rate: u32, timeout: Duration) -> Result<SerialFrameSource> {
    let port = serialport::new(device, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|e| SignError::Sensor(format!("cannot open {device}: {e}")))?;
    info!(device, baud_rate, "radar serial port opened");
    Ok(FrameReader::new(port))
}

// ── Relay ─────────────────────────────────────────────────────────────────────

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Active-low relay on a sysfs GPIO line.
///
/// Engaging configures the line as an output and drives it low; releasing
/// returns the line to an input so the relay board's pull-up switches it off.
pub struct SysfsGpioRelay {
    root: PathBuf,
    pin: u32,
    engaged: Option<bool>,
}

impl SysfsGpioRelay {
    pub fn new(pin: u32) -> Self {
        Self::with_root(SYSFS_GPIO_ROOT, pin)
    }

    pub fn with_root(root: impl Into<PathBuf>, pin: u32) -> Self {
        Self {
            root: root.into(),
            pin,
            engaged: None,
        }
    }

    fn line_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn export(&self) -> Result<()> {
        if self.line_dir().exists() {
            return Ok(());
        }
        write_attr(&self.root.join("export"), &self.pin.to_string())?;
        debug!(pin = self.pin, "gpio exported");
        Ok(())
    }
}

impl Relay for SysfsGpioRelay {
    fn engage(&mut self) -> Result<()> {
        if self.engaged == Some(true) {
            return Ok(());
        }
        self.export()?;
        let dir = self.line_dir();
        write_attr(&dir.join("direction"), "out")?;
        write_attr(&dir.join("value"), "0")?;
        self.engaged = Some(true);
        debug!(pin = self.pin, "relay engaged");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.engaged == Some(false) {
            return Ok(());
        }
        self.export()?;
        write_attr(&self.line_dir().join("direction"), "in")?;
        self.engaged = Some(false);
        debug!(pin = self.pin, "relay released");
        Ok(())
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    std::fs::write(path, value)
        .map_err(|e| SignError::Device(format!("{}: {e}", path.display())))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    // ── FrameReader ───────────────────────────────────────────────────────

    /// Serves queued chunks, then times out.
    struct Chunks(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    fn reader(chunks: Vec<io::Result<Vec<u8>>>) -> FrameReader<Chunks> {
        FrameReader::new(Chunks(chunks.into()))
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn test_frame_assembled_from_split_reads() {
        let mut r = reader(vec![Ok(vec![0xAA, 0x55]), Ok(vec![64, 0x00])]);
        assert_eq!(r.read_frame(TIMEOUT).unwrap(), Some(vec![0xAA, 0x55, 64, 0x00]));
    }

    #[test]
    fn test_timeout_without_bytes_is_none() {
        let mut r = reader(vec![]);
        assert_eq!(r.read_frame(TIMEOUT).unwrap(), None);
    }

    #[test]
    fn test_short_read_returned_for_validation() {
        let mut r = reader(vec![Ok(vec![0xAA, 0x55])]);
        assert_eq!(r.read_frame(TIMEOUT).unwrap(), Some(vec![0xAA, 0x55]));
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut r = reader(vec![Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))]);
        assert!(r.read_frame(TIMEOUT).is_err());
    }

    #[test]
    fn test_open_missing_device_is_sensor_error() {
        let err = open_serial("/dev/does-not-exist-speedsign", 9600, TIMEOUT)
            .err()
            .expect("open must fail");
        assert!(matches!(err, SignError::Sensor(_)));
    }

    // ── SysfsGpioRelay ────────────────────────────────────────────────────

    fn gpio_root(pin: u32) -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(format!("gpio{pin}"))).unwrap();
        tmp
    }

    fn read(tmp: &TempDir, pin: u32, attr: &str) -> String {
        std::fs::read_to_string(tmp.path().join(format!("gpio{pin}")).join(attr)).unwrap()
    }

    #[test]
    fn test_engage_drives_line_low() {
        let tmp = gpio_root(17);
        let mut relay = SysfsGpioRelay::with_root(tmp.path(), 17);

        relay.engage().unwrap();

        assert_eq!(read(&tmp, 17, "direction"), "out");
        assert_eq!(read(&tmp, 17, "value"), "0");
    }

    #[test]
    fn test_release_returns_line_to_input() {
        let tmp = gpio_root(17);
        let mut relay = SysfsGpioRelay::with_root(tmp.path(), 17);

        relay.engage().unwrap();
        relay.release().unwrap();

        assert_eq!(read(&tmp, 17, "direction"), "in");
    }

    #[test]
    fn test_engage_is_idempotent() {
        let tmp = gpio_root(17);
        let mut relay = SysfsGpioRelay::with_root(tmp.path(), 17);
        relay.engage().unwrap();

        std::fs::write(tmp.path().join("gpio17").join("direction"), "marker").unwrap();
        relay.engage().unwrap();

        assert_eq!(read(&tmp, 17, "direction"), "marker");
    }

    #[test]
    fn test_unexported_line_is_exported() {
        let tmp = TempDir::new().unwrap();
        let mut relay = SysfsGpioRelay::with_root(tmp.path(), 22);

        // The fake root has no gpio22 directory, so export is written and the
        // direction write then fails.
        let err = relay.engage().unwrap_err();

        assert_eq!(std::fs::read_to_string(tmp.path().join("export")).unwrap(), "22");
        assert!(matches!(err, SignError::Device(_)));
    }
}
