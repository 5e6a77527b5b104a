use serde::Serialize;
use std::fmt;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of a packed 3-channel buffer at this size.
    pub fn bgr_len(self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// True when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The two coordinate spaces of the system.
///
/// `capture` is the native sensor output, `preview` the downscaled display
/// surface the operator draws on. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub capture: Size,
    pub preview: Size,
}

impl Resolution {
    pub const fn new(capture: Size, preview: Size) -> Self {
        Self { capture, preview }
    }

    /// Preview → capture scale on the x axis.
    pub fn scale_x(&self) -> f64 {
        f64::from(self.capture.width) / f64::from(self.preview.width)
    }

    /// Preview → capture scale on the y axis.
    pub fn scale_y(&self) -> f64 {
        f64::from(self.capture.height) / f64::from(self.preview.height)
    }
}

/// Which link of the fallback chain produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// ISP pipeline opened with the operator's settings.
    Primary,
    /// Generic default device, no ISP settings applied.
    Secondary,
    /// Generated "no camera" frames.
    Synthetic,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISP white-balance mode. Discriminants are the codes the sensor stage expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WhiteBalanceMode {
    Off = 0,
    #[default]
    Auto = 1,
    Incandescent = 2,
    Fluorescent = 3,
    WarmFluorescent = 4,
    Daylight = 5,
    CloudyDaylight = 6,
    Twilight = 7,
    Shade = 8,
    Manual = 9,
}

impl WhiteBalanceMode {
    pub const ALL: [WhiteBalanceMode; 10] = [
        Self::Off,
        Self::Auto,
        Self::Incandescent,
        Self::Fluorescent,
        Self::WarmFluorescent,
        Self::Daylight,
        Self::CloudyDaylight,
        Self::Twilight,
        Self::Shade,
        Self::Manual,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Mode at a combo-box index. Out-of-range indices clamp to the last mode.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Human-readable display name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Auto => "Auto",
            Self::Incandescent => "Incandescent",
            Self::Fluorescent => "Fluorescent",
            Self::WarmFluorescent => "Warm Fluorescent",
            Self::Daylight => "Daylight",
            Self::CloudyDaylight => "Cloudy Daylight",
            Self::Twilight => "Twilight",
            Self::Shade => "Shade",
            Self::Manual => "Manual",
        }
    }
}

/// Mode shared by temporal noise reduction and edge enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessingMode {
    Off = 0,
    #[default]
    Fast = 1,
    HighQuality = 2,
}

impl ProcessingMode {
    pub const ALL: [ProcessingMode; 3] = [Self::Off, Self::Fast, Self::HighQuality];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Mode at a combo-box index. Out-of-range indices clamp to the last mode.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }
}

/// Output orientation applied by the converter stage.
///
/// Only the flip combinations are reachable; `Rotate180` is what both flips
/// compose to, and it must be emitted as that code rather than anything
/// equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Identity,
    HorizontalFlip,
    VerticalFlip,
    Rotate180,
}

impl Orientation {
    pub fn from_flips(h_flip: bool, v_flip: bool) -> Self {
        match (h_flip, v_flip) {
            (false, false) => Self::Identity,
            (true, false) => Self::HorizontalFlip,
            (false, true) => Self::VerticalFlip,
            (true, true) => Self::Rotate180,
        }
    }

    /// Converter `flip-method` code.
    pub fn flip_method(self) -> u8 {
        match self {
            Self::Identity => 0,
            Self::Rotate180 => 2,
            Self::HorizontalFlip => 4,
            Self::VerticalFlip => 6,
        }
    }
}

/// ISP parameters for one capture session. Passed by value into the
/// pipeline builder; a change means a full restart.
///
/// Strength fields are carried even when their mode is `Off`.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Inclusive exposure time range in ns. `None` runs auto-exposure.
    pub exposure_range: Option<(u64, u64)>,
    /// Inclusive analog gain range. `None` runs auto-gain.
    pub gain_range: Option<(f32, f32)>,
    pub ae_lock: bool,
    pub awb_lock: bool,
    pub saturation: f32,
    pub wb_mode: WhiteBalanceMode,
    pub tnr_mode: ProcessingMode,
    pub tnr_strength: f32,
    pub ee_mode: ProcessingMode,
    pub ee_strength: f32,
    pub h_flip: bool,
    pub v_flip: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure_range: None,
            gain_range: None,
            ae_lock: false,
            awb_lock: false,
            saturation: 1.0,
            wb_mode: WhiteBalanceMode::Auto,
            tnr_mode: ProcessingMode::Fast,
            tnr_strength: 0.5,
            ee_mode: ProcessingMode::Fast,
            ee_strength: 0.5,
            h_flip: false,
            v_flip: false,
        }
    }
}

impl CameraSettings {
    pub fn orientation(&self) -> Orientation {
        Orientation::from_flips(self.h_flip, self.v_flip)
    }
}
