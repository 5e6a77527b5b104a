use crate::camera::error::{CameraError, Result};
use crate::camera::pipeline::PipelineDescriptor;
use crate::preview::frame::Frame;

/// A capture backend that can open pipeline descriptors.
///
/// Implemented per device family (GStreamer launcher, test doubles). The
/// session never holds more than one handle from any backend at a time.
pub trait CaptureBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Open a device for the given descriptor.
    fn open(&self, descriptor: &PipelineDescriptor) -> Result<Box<dyn CaptureDevice>>;
}

/// An open device handle, owned by the production thread.
pub trait CaptureDevice: Send {
    /// Block until the next frame is available.
    ///
    /// `CameraError::Read` is transient; the caller retries.
    fn read(&mut self) -> Result<Frame>;

    /// Release the handle. Consumes the device so it cannot be read again.
    fn release(self: Box<Self>) -> Result<()>;
}

/// Backend that never opens. Stands in for hardware that is not present.
pub struct UnavailableBackend;

impl CaptureBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn open(&self, _descriptor: &PipelineDescriptor) -> Result<Box<dyn CaptureDevice>> {
        Err(CameraError::Open("no capture hardware".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::pipeline::PipelineBuilder;
    use crate::camera::types::{CameraSettings, Resolution, Size};

    /// Device that yields one fixed frame and counts reads.
    struct StubDevice {
        reads: usize,
    }

    impl CaptureDevice for StubDevice {
        fn read(&mut self) -> Result<Frame> {
            self.reads += 1;
            Ok(Frame::new(vec![7; 3], 1, 1))
        }

        fn release(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct StubBackend;

    impl CaptureBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        fn open(&self, _descriptor: &PipelineDescriptor) -> Result<Box<dyn CaptureDevice>> {
            Ok(Box::new(StubDevice { reads: 0 }))
        }
    }

    fn descriptor() -> PipelineDescriptor {
        PipelineBuilder::new(Resolution::new(Size::new(4, 4), Size::new(2, 2)), "30/1")
            .build(&CameraSettings::default())
    }

    #[test]
    fn stub_backend_opens_and_reads() {
        let mut device = StubBackend.open(&descriptor()).unwrap();
        let frame = device.read().unwrap();
        assert_eq!(frame.data, vec![7; 3]);
        assert!(device.release().is_ok());
    }

    #[test]
    fn unavailable_backend_fails_to_open() {
        let result = UnavailableBackend.open(&descriptor());
        assert!(matches!(result, Err(CameraError::Open(_))));
    }

    #[test]
    fn trait_objects_are_send() {
        fn assert_send_sync<T: Send + Sync>() {}
        fn assert_send<T: Send>() {}
        assert_send_sync::<Box<dyn CaptureBackend>>();
        assert_send::<Box<dyn CaptureDevice>>();
    }
}
