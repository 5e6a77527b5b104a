//! GStreamer launcher backend.
//!
//! Runs the pipeline in a `gst-launch-1.0` child process terminated in an
//! stdout sink. A reader thread splits stdout into fixed-size BGR frames and
//! hands them over a small bounded channel, so every wait on the pipeline
//! has a timeout. The first frame is awaited during `open`: a pipeline that
//! cannot reach the sensor, or never emits anything, counts as an open
//! failure rather than a stream of read errors.

use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::camera::backend::{CaptureBackend, CaptureDevice};
use crate::camera::error::{CameraError, Result};
use crate::camera::pipeline::{PipelineDescriptor, Sink};
use crate::camera::types::Size;
use crate::preview::frame::Frame;

const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Frames buffered between the pipe reader and the session.
const READ_AHEAD: usize = 2;

/// Backend that opens descriptors with an external launcher program.
pub struct GstLaunchBackend {
    name: String,
    program: String,
    open_timeout: Duration,
    read_timeout: Duration,
}

impl GstLaunchBackend {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Limits for the first frame after launch and for every later frame.
    pub fn with_timeouts(mut self, open: Duration, read: Duration) -> Self {
        self.open_timeout = open;
        self.read_timeout = read;
        self
    }
}

impl CaptureBackend for GstLaunchBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, descriptor: &PipelineDescriptor) -> Result<Box<dyn CaptureDevice>> {
        let mut child = Command::new(&self.program)
            .arg("-q")
            .args(descriptor.launch_args(Sink::Stdout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CameraError::Open(format!("failed to launch {}: {e}", self.program)))?;

        let Some(stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(CameraError::Open("launcher stdout not captured".to_string()));
        };

        let frame_size = descriptor.delivery();
        let (frames_tx, frames) = bounded(READ_AHEAD);
        let spawned = std::thread::Builder::new()
            .name(format!("roicam-{}-reader", self.name))
            .spawn(move || read_frames(stdout, frame_size, frames_tx));
        if let Err(e) = spawned {
            reap(&mut child);
            return Err(CameraError::Open(format!("failed to start pipe reader: {e}")));
        }

        let mut device = GstDevice {
            child,
            frames,
            read_timeout: self.read_timeout,
            pending: None,
        };

        match device.next_frame(self.open_timeout) {
            Ok(frame) => {
                tracing::debug!(backend = %self.name, "first frame received");
                device.pending = Some(frame);
                Ok(Box::new(device))
            }
            Err(e) => {
                if let Err(release_err) = device.shutdown() {
                    tracing::error!(backend = %self.name, "failed to reap launcher: {release_err}");
                }
                Err(CameraError::Open(format!("pipeline produced no frames: {e}")))
            }
        }
    }
}

/// Best-effort kill and wait for a child that never became a device.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Pipe reader loop. Stops after the first error, or once the device side
/// of the channel is gone.
fn read_frames(mut stdout: ChildStdout, size: Size, frames: Sender<Result<Frame>>) {
    loop {
        let mut buf = vec![0u8; size.bgr_len()];
        let result = match stdout.read_exact(&mut buf) {
            Ok(()) => Ok(Frame::new(buf, size.width, size.height)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                Err(CameraError::Read("pipeline ended".to_string()))
            }
            Err(e) => Err(CameraError::Read(e.to_string())),
        };
        let failed = result.is_err();
        if frames.send(result).is_err() || failed {
            break;
        }
    }
    tracing::debug!("pipe reader finished");
}

/// A running launcher child process.
struct GstDevice {
    child: Child,
    frames: Receiver<Result<Frame>>,
    read_timeout: Duration,
    /// Frame consumed while probing in `open`.
    pending: Option<Frame>,
}

impl GstDevice {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        match self.frames.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CameraError::Read(format!(
                "no frame within {} ms",
                timeout.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CameraError::Read("pipeline ended".to_string()))
            }
        }
    }

    /// Kill and reap the child. A child that already exited is fine; one
    /// that cannot be reaped is a leaked handle.
    fn shutdown(&mut self) -> Result<()> {
        // Dropping the receiver unblocks a reader waiting on a full channel.
        drop(std::mem::replace(&mut self.frames, crossbeam_channel::never()));
        if let Err(e) = self.child.kill() {
            if e.kind() != ErrorKind::InvalidInput {
                return Err(CameraError::Release(format!("kill failed: {e}")));
            }
        }
        let status = self
            .child
            .wait()
            .map_err(|e| CameraError::Release(format!("wait failed: {e}")))?;
        tracing::debug!("launcher exited with {status}");
        Ok(())
    }
}

impl CaptureDevice for GstDevice {
    fn read(&mut self) -> Result<Frame> {
        match self.pending.take() {
            Some(frame) => Ok(frame),
            None => self.next_frame(self.read_timeout),
        }
    }

    fn release(mut self: Box<Self>) -> Result<()> {
        self.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::pipeline::PipelineBuilder;
    use crate::camera::types::{CameraSettings, Resolution};

    fn descriptor() -> PipelineDescriptor {
        PipelineBuilder::new(Resolution::new(Size::new(8, 6), Size::new(4, 2)), "30/1")
            .build(&CameraSettings::default())
    }

    #[test]
    fn missing_launcher_is_an_open_failure() {
        let backend = GstLaunchBackend::new("primary", "roicam-no-such-launcher");
        let result = backend.open(&descriptor());
        assert!(matches!(result, Err(CameraError::Open(_))));
    }

    #[cfg(unix)]
    #[test]
    fn launcher_that_exits_immediately_is_an_open_failure() {
        // `true` ignores its arguments and writes nothing.
        let backend = GstLaunchBackend::new("primary", "true");
        let result = backend.open(&descriptor());
        assert!(matches!(result, Err(CameraError::Open(_))));
    }

    /// Write an executable shell script standing in for the launcher.
    #[cfg(unix)]
    fn fake_launcher(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.path().join("fake-launch");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn launcher_output_is_split_into_frames() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = GstLaunchBackend::new("primary", fake_launcher(&dir, "exec cat /dev/zero"));
        let mut device = backend.open(&descriptor()).unwrap();
        let first = device.read().unwrap();
        let second = device.read().unwrap();
        assert_eq!(first.size(), Size::new(8, 6));
        assert_eq!(first.data.len(), 8 * 6 * 3);
        assert!(second.data.iter().all(|&b| b == 0));
        assert!(device.release().is_ok());
    }

    // --- Timeout tests ---

    #[cfg(unix)]
    #[test]
    fn silent_pipeline_times_out_as_an_open_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = GstLaunchBackend::new("primary", fake_launcher(&dir, "exec sleep 30"))
            .with_timeouts(Duration::from_millis(200), Duration::from_millis(100));

        let started = std::time::Instant::now();
        let result = backend.open(&descriptor());
        assert!(matches!(result, Err(CameraError::Open(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn stalled_pipeline_read_fails_instead_of_blocking() {
        let dir = tempfile::TempDir::new().unwrap();
        // One 8x6 BGR frame, then silence.
        let script = fake_launcher(&dir, "head -c 144 /dev/zero\nexec sleep 30");
        let backend = GstLaunchBackend::new("primary", script)
            .with_timeouts(Duration::from_secs(5), Duration::from_millis(100));

        let mut device = backend.open(&descriptor()).unwrap();
        assert!(device.read().is_ok());
        let started = std::time::Instant::now();
        assert!(matches!(device.read(), Err(CameraError::Read(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(device.release().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn session_on_a_stalled_pipeline_still_stops() {
        use crate::camera::backend::UnavailableBackend;
        use crate::camera::chain::FallbackChain;
        use crate::camera::types::SourceKind;
        use crate::preview::capture::CaptureSession;
        use crate::settings::types::AppConfig;
        use std::sync::Arc;

        let dir = tempfile::TempDir::new().unwrap();
        let script = fake_launcher(&dir, "head -c 144 /dev/zero\nexec sleep 30");
        let mut config = AppConfig::for_resolution(Size::new(8, 6), Size::new(4, 3));
        config.session.read_retry_ms = 5;
        let primary = GstLaunchBackend::new("primary", script)
            .with_timeouts(Duration::from_secs(5), Duration::from_millis(100));
        let chain = FallbackChain::new(Box::new(primary), Box::new(UnavailableBackend), &config);
        let mut session = CaptureSession::new(Arc::new(config), chain);

        assert_eq!(
            session.start(CameraSettings::default()).unwrap(),
            SourceKind::Primary
        );
        std::thread::sleep(Duration::from_millis(300));
        assert!(session.diagnostics().read_failures > 0);

        let started = std::time::Instant::now();
        session.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn backend_reports_its_name() {
        let backend = GstLaunchBackend::new("secondary", "gst-launch-1.0");
        assert_eq!(backend.name(), "secondary");
    }
}
