// Region of interest: interactive selection in preview space and the exact
// mapping to capture-space crops.

pub mod crop;
pub mod error;
pub mod selection;

/// Round to the nearest integer, ties to even.
///
/// Every preview/capture conversion goes through this so overlay labels,
/// fixed-size conversion and crops agree to the pixel.
pub(crate) fn round_nearest(value: f64) -> i64 {
    value.round_ties_even() as i64
}
