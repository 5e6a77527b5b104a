use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::camera::chain::{ActiveSource, FallbackChain};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{CameraSettings, Size, SourceKind};
use crate::diagnostics::stats::{DiagnosticSnapshot, DiagnosticStats};
use crate::preview::downscale::downscale;
use crate::preview::frame::{Frame, FrameSlot};
use crate::roi::crop::{crop_frame, CapturedImage};
use crate::roi::selection::Selection;
use crate::settings::types::AppConfig;

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "source", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Opening,
    Streaming(SourceKind),
    Stopping,
    /// A device handle could not be released. Terminal: every later
    /// start or reconfiguration is refused.
    Faulted,
}

/// Commands carried to the production thread.
enum Command {
    Reconfigure(CameraSettings, Sender<Result<SourceKind>>),
    Stop(Sender<Result<()>>),
}

struct Worker {
    commands: Sender<Command>,
    thread: JoinHandle<()>,
}

/// Owns the production thread and, through it, the one open device handle.
///
/// `update_settings` and `stop` block until the previous handle has been
/// released. Callers serialise their own calls; `&mut self` enforces that
/// for a single owner.
pub struct CaptureSession {
    config: Arc<AppConfig>,
    chain: Arc<FallbackChain>,
    slot: Arc<FrameSlot>,
    state: Arc<Mutex<SessionState>>,
    stats: Arc<Mutex<DiagnosticStats>>,
    worker: Option<Worker>,
}

impl CaptureSession {
    pub fn new(config: Arc<AppConfig>, chain: FallbackChain) -> Self {
        Self {
            config,
            chain: Arc::new(chain),
            slot: Arc::new(FrameSlot::new()),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stats: Arc::new(Mutex::new(DiagnosticStats::new())),
            worker: None,
        }
    }

    /// Open the first working source and start producing frames.
    ///
    /// Blocks until the fallback chain has settled. Starting a running
    /// session is a reconfiguration.
    pub fn start(&mut self, settings: CameraSettings) -> Result<SourceKind> {
        if self.state() == SessionState::Faulted {
            return Err(CameraError::SessionFaulted);
        }
        if self.worker.is_some() {
            return self.update_settings(settings);
        }

        self.stats.lock().reset();
        let (commands, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let producer = Producer {
            chain: Arc::clone(&self.chain),
            slot: Arc::clone(&self.slot),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            read_retry: self.config.session.read_retry(),
        };

        let thread = std::thread::Builder::new()
            .name("roicam-capture".to_string())
            .spawn(move || {
                let source = producer.open(&settings);
                // The receiver only goes away if `start` itself was abandoned.
                let _ = ready_tx.send(source.kind());
                producer.run(source, command_rx);
            })
            .map_err(|e| CameraError::Spawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(kind) => {
                info!(source = %kind, "capture session started");
                self.worker = Some(Worker { commands, thread });
                Ok(kind)
            }
            Err(_) => {
                let _ = thread.join();
                *self.state.lock() = SessionState::Idle;
                Err(CameraError::Disconnected)
            }
        }
    }

    /// Stop-then-start restart with new settings.
    ///
    /// Returns once the old handle is released and the new source is
    /// streaming. A release failure faults the session and is returned.
    pub fn update_settings(&mut self, settings: CameraSettings) -> Result<SourceKind> {
        if self.state() == SessionState::Faulted {
            return Err(CameraError::SessionFaulted);
        }
        let Some(worker) = &self.worker else {
            return self.start(settings);
        };

        let (reply_tx, reply_rx) = bounded(1);
        worker
            .commands
            .send(Command::Reconfigure(settings, reply_tx))
            .map_err(|_| CameraError::Disconnected)?;
        let result = reply_rx.recv().map_err(|_| CameraError::Disconnected)?;

        if result.is_err() {
            // The production thread exits after a failed release.
            self.join_worker();
        }
        result
    }

    /// Stop producing frames and release the device. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let (reply_tx, reply_rx) = bounded(1);
        let result = match worker.commands.send(Command::Stop(reply_tx)) {
            Ok(()) => reply_rx.recv().unwrap_or(Err(CameraError::Disconnected)),
            Err(_) => Err(CameraError::Disconnected),
        };
        if worker.thread.join().is_err() {
            error!("capture thread panicked");
        }

        match &result {
            Ok(()) => info!("capture session stopped"),
            Err(e) => error!("capture session stop failed: {e}"),
        }
        result
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state(), SessionState::Streaming(_))
    }

    /// Single-slot hand-off shared with the production thread.
    pub fn slot(&self) -> &Arc<FrameSlot> {
        &self.slot
    }

    /// Most recently produced frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    /// Crop the latest frame to the current selection. `None` until the
    /// first frame arrives.
    pub fn crop_latest(
        &self,
        selection: Option<&Selection>,
        requested: Option<Size>,
    ) -> Option<CapturedImage> {
        let frame = self.slot.latest()?;
        let preview = self.config.camera.resolution().preview;
        Some(crop_frame(&frame, selection, preview, requested))
    }

    /// Latest frame downscaled to preview resolution for display.
    pub fn preview_latest(&self) -> Result<Option<Frame>> {
        let Some(frame) = self.slot.latest() else {
            return Ok(None);
        };
        downscale(&frame, self.config.camera.resolution().preview).map(Some)
    }

    /// Take a snapshot of diagnostic stats for this session.
    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.stats.lock().snapshot()
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            drop(worker.commands);
            if worker.thread.join().is_err() {
                error!("capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("failed to stop capture session on drop: {e}");
        }
    }
}

/// State owned by the production thread.
struct Producer {
    chain: Arc<FallbackChain>,
    slot: Arc<FrameSlot>,
    state: Arc<Mutex<SessionState>>,
    stats: Arc<Mutex<DiagnosticStats>>,
    read_retry: Duration,
}

impl Producer {
    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    fn open(&self, settings: &CameraSettings) -> ActiveSource {
        self.set_state(SessionState::Opening);
        let source = self.chain.open(settings);
        let kind = source.kind();
        self.stats.lock().set_source(Some(kind));
        self.set_state(SessionState::Streaming(kind));
        source
    }

    /// Release the active source, moving to `Idle` or `Faulted`.
    fn release(&self, source: &mut ActiveSource) -> Result<()> {
        self.set_state(SessionState::Stopping);
        match source.release() {
            Ok(()) => {
                self.stats.lock().set_source(None);
                self.set_state(SessionState::Idle);
                Ok(())
            }
            Err(e) => {
                error!(source = %source.kind(), "device handle leaked: {e}");
                self.set_state(SessionState::Faulted);
                Err(e)
            }
        }
    }

    /// Production loop. Every exit path releases the source.
    ///
    /// Paced sources are scheduled against a fixed deadline, so generation
    /// time does not stretch the period. A source that falls more than one
    /// period behind resumes from now instead of bursting.
    fn run(&self, mut source: ActiveSource, commands: Receiver<Command>) {
        let mut due = Instant::now();
        loop {
            let deadline = match source.next_frame() {
                Ok(frame) => {
                    let frame = self.slot.publish(frame);
                    self.stats.lock().record_frame(frame.data.len(), frame.source);
                    let pacing = source.pacing();
                    if pacing.is_zero() {
                        None
                    } else {
                        due = (due + pacing).max(Instant::now());
                        Some(due)
                    }
                }
                Err(e) => {
                    debug!(source = %source.kind(), "transient read failure, retrying: {e}");
                    self.stats.lock().record_read_failure();
                    Some(Instant::now() + self.read_retry)
                }
            };

            let command = match deadline {
                None => match commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                },
                Some(deadline) => match commands.recv_deadline(deadline) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };

            match command {
                None => {}
                Some(Command::Stop(reply)) => {
                    let _ = reply.send(self.release(&mut source));
                    return;
                }
                Some(Command::Reconfigure(settings, reply)) => {
                    if let Err(e) = self.release(&mut source) {
                        let _ = reply.send(Err(e));
                        return;
                    }
                    source = self.open(&settings);
                    due = Instant::now();
                    self.stats.lock().record_restart();
                    info!(source = %source.kind(), "capture session reconfigured");
                    let _ = reply.send(Ok(source.kind()));
                }
            }
        }

        warn!("session handle dropped without stop, releasing device");
        let _ = self.release(&mut source);
    }
}
