//! Interactive and fixed-size ROI selection in preview space.
//!
//! Interactive drags always produce a square. A finalized or fixed-size
//! selection locks the engine until `reset`.

use serde::Serialize;

use crate::camera::types::{Resolution, Size};
use crate::roi::error::{Result, RoiError};
use crate::roi::round_nearest;

/// Selections with a side at or below this many preview pixels are
/// discarded on pointer-up.
pub const MIN_SIDE: i32 = 10;

/// Size token meaning "no fixed size, draw freely".
pub const FREE_SELECT: &str = "Free Select";

/// Tokens offered by the ROI size picker.
pub const ROI_PRESETS: [&str; 4] = [FREE_SELECT, "224x224", "448x448", "896x896"];

/// Position in preview space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// Normalized rectangle in preview space. Width and height count pixels,
/// so `x + width` is one past the right edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreviewRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    None,
    /// Dragging. `current` is the clamped moving corner.
    InProgress { anchor: Point, current: Point },
    Finalized { origin: Point, side: i32 },
    /// Centered selection for an exact capture-space size.
    FixedSize {
        origin: Point,
        width: i32,
        height: i32,
        requested: Size,
    },
}

/// A settled selection as read by the crop mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub rect: PreviewRect,
    /// Capture-space size requested for a fixed-size selection.
    pub fixed: Option<Size>,
}

impl Selection {
    /// Overlay text: the requested size for fixed selections, otherwise the
    /// preview size scaled to capture space.
    pub fn label(&self, resolution: &Resolution) -> String {
        match self.fixed {
            Some(size) => format!("{size} px"),
            None => {
                let w = round_nearest(f64::from(self.rect.width) * resolution.scale_x());
                let h = round_nearest(f64::from(self.rect.height) * resolution.scale_y());
                format!("{w}x{h} px")
            }
        }
    }
}

/// Parse a size picker token. `Ok(None)` for free selection.
pub fn parse_size_token(token: &str) -> Result<Option<Size>> {
    let token = token.trim();
    if token == FREE_SELECT {
        return Ok(None);
    }
    let invalid = || RoiError::InvalidSize(format!("expected WxH, got {token:?}"));
    let (w, h) = token.split_once(['x', 'X']).ok_or_else(invalid)?;
    let w: u32 = w.trim().parse().map_err(|_| invalid())?;
    let h: u32 = h.trim().parse().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok(Some(Size::new(w, h)))
}

/// Selection state machine over the preview viewport.
///
/// Driven from the consumer thread only.
#[derive(Debug, Clone)]
pub struct RoiEngine {
    resolution: Resolution,
    state: SelectionState,
}

impl RoiEngine {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            state: SelectionState::None,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Whether a settled selection blocks new drags.
    pub fn is_locked(&self) -> bool {
        matches!(
            self.state,
            SelectionState::Finalized { .. } | SelectionState::FixedSize { .. }
        )
    }

    fn clamp_to_viewport(&self, point: Point) -> Point {
        let viewport = self.resolution.preview;
        Point::new(
            point.x.clamp(0, viewport.width as i32),
            point.y.clamp(0, viewport.height as i32),
        )
    }

    pub fn pointer_down(&mut self, point: Point, button: PointerButton) {
        if button != PointerButton::Left || self.is_locked() {
            return;
        }
        let anchor = self.clamp_to_viewport(point);
        self.state = SelectionState::InProgress {
            anchor,
            current: anchor,
        };
    }

    /// Drag the moving corner. The corner sits at `anchor ± side` on both
    /// axes, with `side` the larger drag distance, then is clamped to the
    /// viewport.
    pub fn pointer_move(&mut self, point: Point) {
        let SelectionState::InProgress { anchor, .. } = self.state else {
            return;
        };
        let dx = point.x.saturating_sub(anchor.x);
        let dy = point.y.saturating_sub(anchor.y);
        let side = dx.saturating_abs().max(dy.saturating_abs());
        let corner = Point::new(
            anchor.x.saturating_add(side.saturating_mul(direction(dx))),
            anchor.y.saturating_add(side.saturating_mul(direction(dy))),
        );
        self.state = SelectionState::InProgress {
            anchor,
            current: self.clamp_to_viewport(corner),
        };
    }

    /// Finalize the drag into a square of exactly `side` pixels, or discard
    /// it when `side <= MIN_SIDE`.
    pub fn pointer_up(&mut self, button: PointerButton) {
        if button != PointerButton::Left {
            return;
        }
        let SelectionState::InProgress { anchor, current } = self.state else {
            return;
        };
        let dx = current.x - anchor.x;
        let dy = current.y - anchor.y;
        let side = dx.abs().max(dy.abs());
        if side <= MIN_SIDE {
            tracing::debug!(side, "selection too small, discarded");
            self.state = SelectionState::None;
            return;
        }

        // The far corner is `side - 1` away so the inclusive span is `side`.
        let origin = Point::new(
            if dx >= 0 { anchor.x } else { anchor.x - (side - 1) },
            if dy >= 0 { anchor.y } else { anchor.y - (side - 1) },
        );
        self.state = SelectionState::Finalized { origin, side };
    }

    /// Replace any selection with a centered one covering exactly
    /// `width`x`height` capture pixels.
    pub fn set_fixed_roi(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(RoiError::InvalidSize(format!("{width}x{height}")));
        }
        let Resolution { capture, preview } = self.resolution;
        let disp_w = round_nearest(
            f64::from(width) * f64::from(preview.width) / f64::from(capture.width),
        );
        let disp_h = round_nearest(
            f64::from(height) * f64::from(preview.height) / f64::from(capture.height),
        );
        if disp_w <= 0 || disp_h <= 0 {
            return Err(RoiError::InvalidSize(format!(
                "{width}x{height} is smaller than one preview pixel"
            )));
        }
        let (disp_w, disp_h) = match (i32::try_from(disp_w), i32::try_from(disp_h)) {
            (Ok(w), Ok(h)) if w <= preview.width as i32 && h <= preview.height as i32 => (w, h),
            _ => {
                return Err(RoiError::InvalidSize(format!(
                    "{width}x{height} is larger than the {capture} frame"
                )))
            }
        };

        let center_x = preview.width as i32 / 2;
        let center_y = preview.height as i32 / 2;
        self.state = SelectionState::FixedSize {
            origin: Point::new(center_x - disp_w / 2, center_y - disp_h / 2),
            width: disp_w,
            height: disp_h,
            requested: Size::new(width, height),
        };
        Ok(())
    }

    /// Apply a size picker token. Free selection leaves the state alone;
    /// a malformed token is rejected without touching it.
    pub fn apply_size_token(&mut self, token: &str) -> Result<()> {
        match parse_size_token(token)? {
            Some(size) => self.set_fixed_roi(size.width, size.height),
            None => Ok(()),
        }
    }

    pub fn reset(&mut self) {
        self.state = SelectionState::None;
    }

    /// The settled selection, if any. In-progress drags are not selections.
    pub fn current_selection(&self) -> Option<Selection> {
        match self.state {
            SelectionState::Finalized { origin, side } => Some(Selection {
                rect: PreviewRect {
                    x: origin.x,
                    y: origin.y,
                    width: side,
                    height: side,
                },
                fixed: None,
            }),
            SelectionState::FixedSize {
                origin,
                width,
                height,
                requested,
            } => Some(Selection {
                rect: PreviewRect {
                    x: origin.x,
                    y: origin.y,
                    width,
                    height,
                },
                fixed: Some(requested),
            }),
            SelectionState::None | SelectionState::InProgress { .. } => None,
        }
    }

    /// Overlay label of the current selection.
    pub fn label(&self) -> Option<String> {
        self.current_selection()
            .map(|selection| selection.label(&self.resolution))
    }
}

/// Drag direction along one axis; zero counts as positive.
fn direction(delta: i32) -> i32 {
    if delta >= 0 {
        1
    } else {
        -1
    }
}
