use fast_image_resize as fr;
use fr::images::Image;

use crate::camera::error::{CameraError, Result};
use crate::camera::types::Size;
use crate::preview::frame::Frame;

/// Downscale a frame to `target` for the display path.
///
/// Uses `fast_image_resize` for SIMD-accelerated resizing. A frame already
/// at the target size is copied through unchanged. Sequence, source and
/// timestamp carry over so the preview stays matched to its frame.
pub fn downscale(frame: &Frame, target: Size) -> Result<Frame> {
    if target.is_empty() {
        return Err(CameraError::Resize(format!("invalid target size {target}")));
    }
    if frame.size() == target {
        return Ok(frame.clone());
    }

    let src_image = Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.data.clone(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| CameraError::Resize(e.to_string()))?;
    let mut dst_image = Image::new(target.width, target.height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, None)
        .map_err(|e| CameraError::Resize(e.to_string()))?;

    Ok(Frame {
        data: dst_image.into_vec(),
        width: target.width,
        height: target.height,
        sequence: frame.sequence,
        source: frame.source,
        captured_at: frame.captured_at,
    })
}
