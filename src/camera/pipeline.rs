//! Pipeline builder: turns ISP settings into a launchable pipeline
//! description.
//!
//! Pure and deterministic: the same settings and resolutions always yield the
//! same descriptor, byte for byte.

use std::fmt;

use crate::camera::types::{CameraSettings, Orientation, Resolution, Size};

/// Terminal element of a pipeline. Which one is used depends on how the
/// backend consumes frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// In-process application sink that drops stale buffers.
    AppSink,
    /// Raw frames written to the launcher's stdout.
    Stdout,
}

impl Sink {
    fn element(self) -> &'static str {
        match self {
            Self::AppSink => "appsink drop=1",
            Self::Stdout => "fdsink fd=1 sync=false",
        }
    }
}

/// A device pipeline: ordered stages plus what it ultimately delivers.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    stages: Vec<String>,
    delivery: Size,
    orientation: Orientation,
}

impl PipelineDescriptor {
    /// Size of the packed BGR frames the pipeline emits.
    pub fn delivery(&self) -> Size {
        self.delivery
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Full launch line terminated by `sink`.
    pub fn launch_line(&self, sink: Sink) -> String {
        let mut line = self.stages.join(" ! ");
        line.push_str(" ! ");
        line.push_str(sink.element());
        line
    }

    /// Launch line split into argv tokens. Double-quoted values stay one
    /// token with the quotes removed.
    pub fn launch_args(&self, sink: Sink) -> Vec<String> {
        let line = self.launch_line(sink);
        let mut args = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        for c in line.chars() {
            match c {
                '"' => quoted = !quoted,
                c if c.is_whitespace() && !quoted => {
                    if !current.is_empty() {
                        args.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            args.push(current);
        }
        args
    }
}

impl fmt::Display for PipelineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.launch_line(Sink::AppSink))
    }
}

/// Builds pipeline descriptors for a fixed resolution pair.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    resolution: Resolution,
    framerate: String,
}

impl PipelineBuilder {
    pub fn new(resolution: Resolution, framerate: impl Into<String>) -> Self {
        Self {
            resolution,
            framerate: framerate.into(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// ISP pipeline for the primary sensor.
    ///
    /// Raw NV12 at capture resolution from the sensor, flipped and converted
    /// to BGRx, then packed to 3-channel BGR. Frames stay at capture
    /// resolution so crops are taken from full-size pixels; the display
    /// path scales them down to preview size on its own.
    pub fn build(&self, settings: &CameraSettings) -> PipelineDescriptor {
        let mut source = String::from("nvarguscamerasrc");
        if let Some((min, max)) = settings.exposure_range {
            source.push_str(&format!(" exposuretimerange=\"{min} {max}\""));
        }
        if let Some((min, max)) = settings.gain_range {
            source.push_str(&format!(
                " gainrange=\"{} {}\"",
                fmt_float(min),
                fmt_float(max)
            ));
        }
        if settings.ae_lock {
            source.push_str(" aelock=true");
        }
        if settings.awb_lock {
            source.push_str(" awblock=true");
        }
        source.push_str(&format!(
            " saturation={} wbmode={} tnr-mode={} tnr-strength={} ee-mode={} ee-strength={}",
            fmt_float(settings.saturation),
            settings.wb_mode.code(),
            settings.tnr_mode.code(),
            fmt_float(settings.tnr_strength),
            settings.ee_mode.code(),
            fmt_float(settings.ee_strength),
        ));

        let capture = self.resolution.capture;
        let orientation = settings.orientation();
        let stages = vec![
            source,
            format!(
                "video/x-raw(memory:NVMM), width={}, height={}, format=NV12, framerate={}",
                capture.width, capture.height, self.framerate
            ),
            format!("nvvidconv flip-method={}", orientation.flip_method()),
            format!(
                "video/x-raw, width={}, height={}, format=BGRx",
                capture.width, capture.height
            ),
            "videoconvert".to_string(),
            "video/x-raw, format=BGR".to_string(),
        ];

        PipelineDescriptor {
            stages,
            delivery: capture,
            orientation,
        }
    }

    /// Generic pipeline for a plain V4L2 device. No ISP settings apply.
    pub fn default_device(&self, device_path: &str) -> PipelineDescriptor {
        let capture = self.resolution.capture;
        let stages = vec![
            format!("v4l2src device={device_path}"),
            "videoconvert".to_string(),
            "videoscale".to_string(),
            format!(
                "video/x-raw, width={}, height={}, format=BGR",
                capture.width, capture.height
            ),
        ];
        PipelineDescriptor {
            stages,
            delivery: capture,
            orientation: Orientation::Identity,
        }
    }
}

/// Floats always carry a fractional part (`1.0`, not `1`).
fn fmt_float(value: f32) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::types::{ProcessingMode, WhiteBalanceMode};

    fn builder() -> PipelineBuilder {
        PipelineBuilder::new(
            Resolution::new(Size::new(1640, 1232), Size::new(960, 540)),
            "30/1",
        )
    }

    #[test]
    fn default_settings_produce_auto_exposure_pipeline() {
        let desc = builder().build(&CameraSettings::default());
        assert_eq!(
            desc.to_string(),
            "nvarguscamerasrc saturation=1.0 wbmode=1 tnr-mode=1 tnr-strength=0.5 \
             ee-mode=1 ee-strength=0.5 ! video/x-raw(memory:NVMM), width=1640, \
             height=1232, format=NV12, framerate=30/1 ! nvvidconv flip-method=0 ! \
             video/x-raw, width=1640, height=1232, format=BGRx ! videoconvert ! \
             video/x-raw, format=BGR ! appsink drop=1"
        );
        assert_eq!(desc.delivery(), Size::new(1640, 1232));
    }

    #[test]
    fn ranges_are_emitted_as_quoted_min_max() {
        let settings = CameraSettings {
            exposure_range: Some((13000, 3013000)),
            gain_range: Some((1.0, 2.5)),
            ..CameraSettings::default()
        };
        let line = builder().build(&settings).to_string();
        assert!(line.contains("exposuretimerange=\"13000 3013000\""));
        assert!(line.contains("gainrange=\"1.0 2.5\""));
    }

    #[test]
    fn lock_directives_only_appear_when_set() {
        let unlocked = builder().build(&CameraSettings::default()).to_string();
        assert!(!unlocked.contains("aelock"));
        assert!(!unlocked.contains("awblock"));

        let locked = builder()
            .build(&CameraSettings {
                ae_lock: true,
                awb_lock: true,
                ..CameraSettings::default()
            })
            .to_string();
        assert!(locked.contains("aelock=true"));
        assert!(locked.contains("awblock=true"));
    }

    #[test]
    fn isp_directives_are_emitted_regardless_of_mode() {
        let settings = CameraSettings {
            ae_lock: true,
            saturation: 1.8,
            wb_mode: WhiteBalanceMode::Shade,
            tnr_mode: ProcessingMode::Off,
            tnr_strength: 0.2,
            ee_mode: ProcessingMode::HighQuality,
            ee_strength: 1.0,
            ..CameraSettings::default()
        };
        let line = builder().build(&settings).to_string();
        assert!(line.contains(
            "saturation=1.8 wbmode=8 tnr-mode=0 tnr-strength=0.2 ee-mode=2 ee-strength=1.0"
        ));
    }

    #[test]
    fn flips_select_the_flip_method() {
        for (h, v, code) in [(false, false, 0), (true, false, 4), (false, true, 6), (true, true, 2)] {
            let desc = builder().build(&CameraSettings {
                h_flip: h,
                v_flip: v,
                ..CameraSettings::default()
            });
            assert!(desc
                .to_string()
                .contains(&format!("nvvidconv flip-method={code} !")));
            assert_eq!(desc.orientation().flip_method(), code);
        }
    }

    #[test]
    fn build_is_deterministic() {
        let settings = CameraSettings {
            exposure_range: Some((1, 2)),
            ..CameraSettings::default()
        };
        assert_eq!(builder().build(&settings), builder().build(&settings));
    }

    #[test]
    fn launch_args_keep_quoted_ranges_together() {
        let settings = CameraSettings {
            exposure_range: Some((13000, 16000)),
            ..CameraSettings::default()
        };
        let args = builder().build(&settings).launch_args(Sink::Stdout);
        assert_eq!(args[0], "nvarguscamerasrc");
        assert_eq!(args[1], "exposuretimerange=13000 16000");
        assert_eq!(args.last().map(String::as_str), Some("sync=false"));
        assert!(args.contains(&"fdsink".to_string()));
    }

    #[test]
    fn default_device_delivers_capture_resolution() {
        let desc = builder().default_device("/dev/video0");
        assert_eq!(
            desc.launch_line(Sink::Stdout),
            "v4l2src device=/dev/video0 ! videoconvert ! videoscale ! \
             video/x-raw, width=1640, height=1232, format=BGR ! fdsink fd=1 sync=false"
        );
        assert_eq!(desc.delivery(), Size::new(1640, 1232));
    }

    #[test]
    fn every_pipeline_delivers_capture_resolution() {
        let builder = builder();
        let primary = builder.build(&CameraSettings::default());
        let fallback = builder.default_device("/dev/video0");
        assert_eq!(primary.delivery(), builder.resolution().capture);
        assert_eq!(fallback.delivery(), builder.resolution().capture);
        assert!(!primary.to_string().contains("width=960"));
    }
}
