//! Preview-space selection to capture-space crop rectangle.
//!
//! Pure functions. Each of the four scaled values is rounded on its own,
//! so a scaled width can drift a pixel from what the rounded corners
//! suggest. Operators see the same drift in the overlay label; a fixed
//! target size overrides it.

use serde::Serialize;

use crate::camera::types::Size;
use crate::preview::frame::Frame;
use crate::roi::round_nearest;
use crate::roi::selection::Selection;

/// Crop rectangle in capture space, inside the frame bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Capture-space rectangle before clamping. May extend past any edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl ScaledRect {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Scale a selection into capture space, rounding each field independently.
pub fn scale_selection(selection: &Selection, capture: Size, preview: Size) -> ScaledRect {
    let scale_x = f64::from(capture.width) / f64::from(preview.width);
    let scale_y = f64::from(capture.height) / f64::from(preview.height);
    let rect = selection.rect;
    ScaledRect {
        x: round_nearest(f64::from(rect.x) * scale_x),
        y: round_nearest(f64::from(rect.y) * scale_y),
        width: round_nearest(f64::from(rect.width) * scale_x),
        height: round_nearest(f64::from(rect.height) * scale_y),
    }
}

/// Resize to exactly `target`, keeping the center of `rect`.
pub fn recenter(rect: ScaledRect, target: Size) -> ScaledRect {
    let (center_x, center_y) = rect.center();
    let width = i64::from(target.width);
    let height = i64::from(target.height);
    ScaledRect {
        x: round_nearest(center_x - width as f64 / 2.0),
        y: round_nearest(center_y - height as f64 / 2.0),
        width,
        height,
    }
}

/// Clamp to the frame. `None` when nothing of the rectangle is left.
pub fn clamp(rect: ScaledRect, capture: Size) -> Option<CropRect> {
    let x = rect.x.max(0);
    let y = rect.y.max(0);
    let width = rect.width.min(i64::from(capture.width) - x);
    let height = rect.height.min(i64::from(capture.height) - y);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(CropRect {
        x: u32::try_from(x).ok()?,
        y: u32::try_from(y).ok()?,
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
    })
}

/// Map a preview-space selection to a capture-space crop.
///
/// `requested` overrides the selection's own fixed size. `None` means no
/// crop: either nothing is selected or the clamped rectangle is empty.
pub fn map_selection(
    selection: Option<&Selection>,
    capture: Size,
    preview: Size,
    requested: Option<Size>,
) -> Option<CropRect> {
    let selection = selection?;
    if capture.is_empty() || preview.is_empty() {
        return None;
    }
    let mut rect = scale_selection(selection, capture, preview);
    if let Some(target) = requested.or(selection.fixed) {
        rect = recenter(rect, target);
    }
    clamp(rect, capture)
}

/// Raw pixel buffer handed to whoever persists the capture.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Packed BGR.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Applied crop, `None` for the full frame.
    pub crop: Option<CropRect>,
    pub sequence: u64,
}

/// Crop `frame` to the selection, using the frame's own dimensions as
/// capture space. Falls back to the full frame when there is no crop.
pub fn crop_frame(
    frame: &Frame,
    selection: Option<&Selection>,
    preview: Size,
    requested: Option<Size>,
) -> CapturedImage {
    let crop = map_selection(selection, frame.size(), preview, requested);
    if let Some(rect) = crop {
        if let Some(cropped) = frame.crop(&rect) {
            return CapturedImage {
                data: cropped.data,
                width: cropped.width,
                height: cropped.height,
                crop: Some(rect),
                sequence: frame.sequence,
            };
        }
        tracing::warn!(?rect, "crop does not fit the frame buffer, using full frame");
    }
    CapturedImage {
        data: frame.data.clone(),
        width: frame.width,
        height: frame.height,
        crop: None,
        sequence: frame.sequence,
    }
}
