//! Mock capture backend for testing without hardware.
//!
//! Uses a builder pattern to script open, read and release failures, and
//! keeps handle counters so tests can check that no two handles are ever
//! open at once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::camera::backend::{CaptureBackend, CaptureDevice};
use crate::camera::error::{CameraError, Result};
use crate::camera::pipeline::PipelineDescriptor;
use crate::preview::frame::Frame;

/// Fill byte of every frame the mock produces.
pub const MOCK_PIXEL: u8 = 0x40;

#[derive(Debug, Default)]
struct MockState {
    fail_open: bool,
    read_failures: usize,
    release_failures: usize,
    read_delay: Duration,
    opens: usize,
    releases: usize,
    open_handles: usize,
    peak_open_handles: usize,
    reads: usize,
    descriptors: Vec<String>,
}

/// Mock backend. Clones share state, so a test can keep one clone and hand
/// the other to the session.
#[derive(Clone)]
pub struct MockBackend {
    name: &'static str,
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// A working backend whose reads take 2ms.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(MockState {
                read_delay: Duration::from_millis(2),
                ..MockState::default()
            })),
        }
    }

    /// Every open attempt fails.
    pub fn failing_open(self) -> Self {
        self.state.lock().fail_open = true;
        self
    }

    /// The next `count` reads fail with a transient error.
    pub fn with_read_failures(self, count: usize) -> Self {
        self.state.lock().read_failures = count;
        self
    }

    /// The next release fails and the handle stays counted as open.
    pub fn failing_release(self) -> Self {
        self.state.lock().release_failures = 1;
        self
    }

    pub fn with_read_delay(self, delay: Duration) -> Self {
        self.state.lock().read_delay = delay;
        self
    }

    /// Successful opens so far.
    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    /// Successful releases so far.
    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles
    }

    /// Highest number of handles ever open at the same time.
    pub fn peak_open_handles(&self) -> usize {
        self.state.lock().peak_open_handles
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Launch lines of every descriptor passed to `open`, in order.
    pub fn descriptors(&self) -> Vec<String> {
        self.state.lock().descriptors.clone()
    }
}

impl CaptureBackend for MockBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn open(&self, descriptor: &PipelineDescriptor) -> Result<Box<dyn CaptureDevice>> {
        let mut state = self.state.lock();
        state.descriptors.push(descriptor.to_string());
        if state.fail_open {
            return Err(CameraError::Open(format!("{} scripted open failure", self.name)));
        }
        state.opens += 1;
        state.open_handles += 1;
        state.peak_open_handles = state.peak_open_handles.max(state.open_handles);
        let delivery = descriptor.delivery();
        Ok(Box::new(MockDevice {
            state: Arc::clone(&self.state),
            width: delivery.width,
            height: delivery.height,
        }))
    }
}

struct MockDevice {
    state: Arc<Mutex<MockState>>,
    width: u32,
    height: u32,
}

impl CaptureDevice for MockDevice {
    fn read(&mut self) -> Result<Frame> {
        let delay = {
            let mut state = self.state.lock();
            state.reads += 1;
            if state.read_failures > 0 {
                state.read_failures -= 1;
                return Err(CameraError::Read("scripted read failure".to_string()));
            }
            state.read_delay
        };
        std::thread::sleep(delay);
        let len = self.width as usize * self.height as usize * 3;
        Ok(Frame::new(vec![MOCK_PIXEL; len], self.width, self.height))
    }

    fn release(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock();
        if state.release_failures > 0 {
            state.release_failures -= 1;
            return Err(CameraError::Release("scripted release failure".to_string()));
        }
        state.releases += 1;
        state.open_handles -= 1;
        Ok(())
    }
}
