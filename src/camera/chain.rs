//! Fallback chain: primary device, then a generic default device, then
//! synthetic frames.
//!
//! Open failures are logged and never surface to the caller: `open` always
//! yields a source, so the consumer is never left without frames.

use std::time::Duration;

use crate::camera::backend::{CaptureBackend, CaptureDevice};
use crate::camera::error::{CameraError, Result};
use crate::camera::pipeline::PipelineBuilder;
use crate::camera::synthetic::SyntheticSource;
use crate::camera::types::{CameraSettings, SourceKind};
use crate::preview::frame::Frame;
use crate::settings::types::AppConfig;

/// Tries each source in order until one opens.
pub struct FallbackChain {
    primary: Box<dyn CaptureBackend>,
    secondary: Box<dyn CaptureBackend>,
    builder: PipelineBuilder,
    secondary_device: String,
    synthetic_interval: Duration,
}

impl FallbackChain {
    pub fn new(
        primary: Box<dyn CaptureBackend>,
        secondary: Box<dyn CaptureBackend>,
        config: &AppConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            builder: PipelineBuilder::new(
                config.camera.resolution(),
                config.camera.framerate.clone(),
            ),
            secondary_device: config.session.secondary_device.clone(),
            synthetic_interval: config.session.synthetic_interval(),
        }
    }

    pub fn builder(&self) -> &PipelineBuilder {
        &self.builder
    }

    /// Open the first source that works. Exactly one source is active in
    /// the returned value.
    pub fn open(&self, settings: &CameraSettings) -> ActiveSource {
        let descriptor = self.builder.build(settings);
        tracing::info!(backend = self.primary.name(), pipeline = %descriptor, "opening primary device");
        match self.primary.open(&descriptor) {
            Ok(device) => return ActiveSource::device(SourceKind::Primary, device),
            Err(e) => tracing::warn!(
                backend = self.primary.name(),
                "primary pipeline failed, trying default device: {e}"
            ),
        }

        let fallback = self.builder.default_device(&self.secondary_device);
        match self.secondary.open(&fallback) {
            Ok(device) => return ActiveSource::device(SourceKind::Secondary, device),
            Err(e) => tracing::warn!(
                backend = self.secondary.name(),
                device = %self.secondary_device,
                "default device failed: {e}"
            ),
        }

        tracing::warn!("camera not found, using synthetic frame generator");
        ActiveSource::synthetic(SyntheticSource::new(
            self.builder.resolution().capture,
            self.synthetic_interval,
        ))
    }
}

enum Inner {
    Device(Box<dyn CaptureDevice>),
    Synthetic(SyntheticSource),
    Released,
}

/// The one source a session is currently reading from.
///
/// Owns the device handle. `release` is the normal exit; dropping an
/// unreleased device releases it as well, so unwinding out of the
/// production loop cannot leak the handle.
pub struct ActiveSource {
    kind: SourceKind,
    inner: Inner,
}

impl ActiveSource {
    fn device(kind: SourceKind, device: Box<dyn CaptureDevice>) -> Self {
        tracing::info!(source = %kind, "capture device opened");
        Self {
            kind,
            inner: Inner::Device(device),
        }
    }

    fn synthetic(source: SyntheticSource) -> Self {
        Self {
            kind: SourceKind::Synthetic,
            inner: Inner::Synthetic(source),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Minimum wait between frames. Zero for devices, which block in `read`.
    pub fn pacing(&self) -> Duration {
        match &self.inner {
            Inner::Synthetic(source) => source.interval(),
            _ => Duration::ZERO,
        }
    }

    /// Acquire one frame, tagged with this source's kind.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let kind = self.kind;
        match &mut self.inner {
            Inner::Device(device) => device.read().map(|mut frame| {
                frame.source = kind;
                frame
            }),
            Inner::Synthetic(source) => Ok(source.next_frame()),
            Inner::Released => Err(CameraError::Read("source already released".to_string())),
        }
    }

    /// Release the device handle. Idempotent; synthetic sources have
    /// nothing to release.
    pub fn release(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.inner, Inner::Released) {
            Inner::Device(device) => {
                device.release()?;
                tracing::info!(source = %self.kind, "capture device released");
                Ok(())
            }
            Inner::Synthetic(_) | Inner::Released => Ok(()),
        }
    }
}

impl Drop for ActiveSource {
    fn drop(&mut self) {
        if matches!(self.inner, Inner::Device(_)) {
            tracing::warn!(source = %self.kind, "active source dropped without release");
            if let Err(e) = self.release() {
                tracing::error!(source = %self.kind, "release on drop failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::backend::UnavailableBackend;
    use crate::camera::mock::MockBackend;
    use crate::camera::types::Size;

    fn config() -> AppConfig {
        AppConfig::for_resolution(Size::new(16, 12), Size::new(8, 6))
    }

    #[test]
    fn primary_wins_when_it_opens() {
        let primary = MockBackend::new("primary");
        let secondary = MockBackend::new("secondary");
        let chain = FallbackChain::new(
            Box::new(primary.clone()),
            Box::new(secondary.clone()),
            &config(),
        );

        let mut source = chain.open(&CameraSettings::default());
        assert_eq!(source.kind(), SourceKind::Primary);
        assert_eq!(secondary.descriptors().len(), 0);
        source.release().unwrap();
        assert_eq!(primary.open_handles(), 0);
    }

    #[test]
    fn secondary_gets_the_default_device_pipeline() {
        let secondary = MockBackend::new("secondary");
        let chain = FallbackChain::new(
            Box::new(MockBackend::new("primary").failing_open()),
            Box::new(secondary.clone()),
            &config(),
        );

        let mut source = chain.open(&CameraSettings::default());
        assert_eq!(source.kind(), SourceKind::Secondary);
        assert!(secondary.descriptors()[0].starts_with("v4l2src device=/dev/video0"));

        let frame = source.next_frame().unwrap();
        assert_eq!(frame.source, SourceKind::Secondary);
        assert_eq!(frame.size(), Size::new(16, 12));
        source.release().unwrap();
    }

    #[test]
    fn synthetic_is_the_last_resort() {
        let chain = FallbackChain::new(
            Box::new(UnavailableBackend),
            Box::new(UnavailableBackend),
            &config(),
        );

        let mut source = chain.open(&CameraSettings::default());
        assert_eq!(source.kind(), SourceKind::Synthetic);
        assert!(source.pacing() > Duration::ZERO);
        let frame = source.next_frame().unwrap();
        assert!(frame.is_synthetic());
        assert_eq!(frame.size(), Size::new(16, 12));
        assert!(source.release().is_ok());
    }

    #[test]
    fn release_is_idempotent() {
        let primary = MockBackend::new("primary");
        let chain = FallbackChain::new(
            Box::new(primary.clone()),
            Box::new(UnavailableBackend),
            &config(),
        );
        let mut source = chain.open(&CameraSettings::default());
        source.release().unwrap();
        source.release().unwrap();
        assert_eq!(primary.releases(), 1);
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn dropping_an_unreleased_source_releases_the_device() {
        let primary = MockBackend::new("primary");
        let chain = FallbackChain::new(
            Box::new(primary.clone()),
            Box::new(UnavailableBackend),
            &config(),
        );
        let source = chain.open(&CameraSettings::default());
        assert_eq!(primary.open_handles(), 1);
        drop(source);
        assert_eq!(primary.open_handles(), 0);
    }
}
