// Preview pipeline: frame hand-off, the capture session, and display downscaling.

pub mod capture;
pub mod downscale;
pub mod frame;
