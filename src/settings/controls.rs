//! Operator control positions and their mapping to ISP settings.
//!
//! Sliders are integer steps: exposure in multiplier steps above the
//! baseline, everything else in tenths.

use serde::{Deserialize, Serialize};

use crate::camera::types::{CameraSettings, ProcessingMode, WhiteBalanceMode};
use crate::settings::types::CameraConfig;

pub const EXPOSURE_STEPS: std::ops::RangeInclusive<u32> = 1..=10;
pub const GAIN_TENTHS: std::ops::RangeInclusive<u32> = 10..=100;
pub const SATURATION_TENTHS: std::ops::RangeInclusive<u32> = 0..=20;
pub const STRENGTH_TENTHS: std::ops::RangeInclusive<u32> = 0..=10;

/// Raw positions of the control panel widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlInputs {
    pub exposure_step: u32,
    pub gain_tenths: u32,
    pub ae_lock: bool,
    pub awb_lock: bool,
    pub saturation_tenths: u32,
    pub wb_index: usize,
    pub tnr_index: usize,
    pub tnr_strength_tenths: u32,
    pub ee_index: usize,
    pub ee_strength_tenths: u32,
    pub h_flip: bool,
    pub v_flip: bool,
}

impl ControlInputs {
    /// Panel state at startup.
    pub fn initial(config: &CameraConfig) -> Self {
        let gain = (f64::from(config.gain_min) * 10.0).round_ties_even() as u32;
        Self {
            exposure_step: 5,
            gain_tenths: clamp_to(gain, &GAIN_TENTHS),
            ae_lock: false,
            awb_lock: false,
            saturation_tenths: 10,
            wb_index: WhiteBalanceMode::Auto.code() as usize,
            tnr_index: ProcessingMode::Fast.code() as usize,
            tnr_strength_tenths: 5,
            ee_index: ProcessingMode::Fast.code() as usize,
            ee_strength_tenths: 5,
            h_flip: false,
            v_flip: false,
        }
    }

    /// Map widget positions to ISP settings. Positions outside a slider's
    /// range are clamped; enum indices past the end pick the last value.
    pub fn to_settings(&self, config: &CameraConfig) -> CameraSettings {
        let step = u64::from(clamp_to(self.exposure_step, &EXPOSURE_STEPS));
        let exposure_max = config
            .exposure_min
            .saturating_add(step.saturating_mul(config.exposure_multiplier));
        let gain = tenths(clamp_to(self.gain_tenths, &GAIN_TENTHS));

        CameraSettings {
            exposure_range: Some((config.exposure_min, exposure_max)),
            gain_range: Some((gain, gain)),
            ae_lock: self.ae_lock,
            awb_lock: self.awb_lock,
            saturation: tenths(clamp_to(self.saturation_tenths, &SATURATION_TENTHS)),
            wb_mode: WhiteBalanceMode::from_index(self.wb_index),
            tnr_mode: ProcessingMode::from_index(self.tnr_index),
            tnr_strength: tenths(clamp_to(self.tnr_strength_tenths, &STRENGTH_TENTHS)),
            ee_mode: ProcessingMode::from_index(self.ee_index),
            ee_strength: tenths(clamp_to(self.ee_strength_tenths, &STRENGTH_TENTHS)),
            h_flip: self.h_flip,
            v_flip: self.v_flip,
        }
    }
}

fn clamp_to(value: u32, range: &std::ops::RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

fn tenths(value: u32) -> f32 {
    value as f32 / 10.0
}
