use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::types::{Size, SourceKind};
use crate::preview::frame::Frame;

/// Text burnt into every synthetic frame.
pub const SYNTHETIC_BANNER: &str = "NO CAMERA - DUMMY MODE";

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Horizontal advance per glyph, in font cells (glyph + 1 cell gap).
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Banner colour (BGR) and the band drawn behind it.
const TEXT_BGR: [u8; 3] = [255, 255, 255];
const BAND_BGR: [u8; 3] = [0, 0, 0];

/// 5x7 bitmap rows, bit 4 is the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x19, 0x15, 0x13, 0x13, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => [0; 7],
    }
}

/// Share of the frame height re-randomised per frame.
const NOISE_STRIP_DIVISOR: u32 = 64;

/// Last link of the fallback chain: fabricates noise frames so the
/// consumer is never starved when no device opens.
///
/// The full noise field and banner are rendered once. Each frame then
/// refreshes one horizontal strip of noise, rolling down the image, so
/// producing a frame costs a copy plus a small fill.
///
/// Force it on with `ROICAM_SYNTHETIC=1`.
pub struct SyntheticSource {
    size: Size,
    interval: Duration,
    rng: StdRng,
    canvas: Vec<u8>,
    /// Rows covered by the banner band, never overwritten with noise.
    band: Option<(u32, u32)>,
    next_row: u32,
}

impl SyntheticSource {
    pub fn new(size: Size, interval: Duration) -> Self {
        let mut rng = StdRng::from_entropy();
        let mut canvas = vec![0u8; size.bgr_len()];
        rng.fill(&mut canvas[..]);
        let band = draw_banner(&mut canvas, size, SYNTHETIC_BANNER);
        Self {
            size,
            interval,
            rng,
            canvas,
            band,
            next_row: 0,
        }
    }

    /// Whether synthetic mode is forced via environment variable.
    pub fn is_forced() -> bool {
        std::env::var("ROICAM_SYNTHETIC").is_ok_and(|v| v == "1" || v == "true")
    }

    /// Time between generated frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Generate the next frame: the previous noise with one fresh strip.
    pub fn next_frame(&mut self) -> Frame {
        self.refresh_strip();
        let mut frame = Frame::new(self.canvas.clone(), self.size.width, self.size.height);
        frame.source = SourceKind::Synthetic;
        frame
    }

    fn refresh_strip(&mut self) {
        if self.size.is_empty() {
            return;
        }
        let strip = (self.size.height / NOISE_STRIP_DIVISOR).max(1);
        let row_len = self.size.width as usize * 3;
        for row in self.next_row..(self.next_row + strip).min(self.size.height) {
            if self.band.is_some_and(|(top, bottom)| (top..bottom).contains(&row)) {
                continue;
            }
            let start = row as usize * row_len;
            self.rng.fill(&mut self.canvas[start..start + row_len]);
        }
        self.next_row = (self.next_row + strip) % self.size.height;
    }
}

/// Draw `text` centred on a solid band across the middle of the frame,
/// scaled to fill most of the width. Returns the band's row range, or
/// `None` when the frame is too small for the font.
fn draw_banner(data: &mut [u8], size: Size, text: &str) -> Option<(u32, u32)> {
    let cells = text.chars().count() as u32 * GLYPH_ADVANCE + 2;
    let scale = (size.width / cells).min(size.height / (GLYPH_HEIGHT + 2));
    if scale == 0 {
        return None;
    }

    let band_height = (GLYPH_HEIGHT + 2) * scale;
    let band_top = (size.height - band_height) / 2;
    fill_rect(data, size, 0, band_top, size.width, band_height, BAND_BGR);

    let text_width = (cells - 2) * scale;
    let mut x = (size.width - text_width) / 2;
    let y = band_top + scale;
    for c in text.chars() {
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    fill_rect(
                        data,
                        size,
                        x + col * scale,
                        y + row as u32 * scale,
                        scale,
                        scale,
                        TEXT_BGR,
                    );
                }
            }
        }
        x += GLYPH_ADVANCE * scale;
    }
    Some((band_top, band_top + band_height))
}

fn fill_rect(data: &mut [u8], size: Size, x: u32, y: u32, w: u32, h: u32, bgr: [u8; 3]) {
    let right = (x + w).min(size.width);
    let bottom = (y + h).min(size.height);
    if x >= right {
        return;
    }
    for row in y..bottom {
        let start = (row as usize * size.width as usize + x as usize) * 3;
        let end = (row as usize * size.width as usize + right as usize) * 3;
        for px in data[start..end].chunks_exact_mut(3) {
            px.copy_from_slice(&bgr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_frames_are_tagged() {
        let mut source = SyntheticSource::new(Size::new(320, 240), Duration::from_millis(100));
        let frame = source.next_frame();
        assert!(frame.is_synthetic());
        assert_eq!(frame.size(), Size::new(320, 240));
        assert_eq!(frame.data.len(), 320 * 240 * 3);
    }

    #[test]
    fn synthetic_frame_carries_a_visible_banner() {
        let size = Size::new(320, 240);
        let mut source = SyntheticSource::new(size, Duration::from_millis(100));
        let frame = source.next_frame();

        // scale = min(320 / 134, 240 / 9) = 2, band is 18 rows centred.
        let band_top = (240 - 18) / 2;
        let left_edge = frame.get_pixel(0, band_top + 1).unwrap();
        assert_eq!(left_edge, BAND_BGR);

        let white = (0..size.width)
            .filter(|&x| frame.get_pixel(x, band_top + 2) == Some(TEXT_BGR))
            .count();
        assert!(white > 0, "banner text should be drawn");
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = SyntheticSource::new(Size::new(64, 48), Duration::from_millis(10));
        let a = source.next_frame();
        let b = source.next_frame();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn banner_survives_noise_refreshes() {
        let size = Size::new(320, 240);
        let mut source = SyntheticSource::new(size, Duration::from_millis(100));
        let band_top = (240 - 18) / 2;
        // Enough frames for the strip to wrap around the whole image.
        for _ in 0..100 {
            let frame = source.next_frame();
            assert_eq!(frame.get_pixel(0, band_top + 1), Some(BAND_BGR));
        }
    }

    #[test]
    fn default_capture_frames_are_cheap_enough_for_ten_per_second() {
        let mut source = SyntheticSource::new(Size::new(1640, 1232), Duration::from_millis(100));
        let started = std::time::Instant::now();
        for _ in 0..10 {
            source.next_frame();
        }
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "10 frames took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn tiny_frames_skip_the_banner() {
        let mut source = SyntheticSource::new(Size::new(8, 8), Duration::from_millis(10));
        let frame = source.next_frame();
        assert_eq!(frame.data.len(), 8 * 8 * 3);
    }

    #[test]
    fn unknown_glyphs_render_blank() {
        assert_eq!(glyph('?'), [0; 7]);
        assert_eq!(glyph('a'), glyph('A'));
    }

    #[test]
    fn interval_is_reported() {
        let source = SyntheticSource::new(Size::new(8, 8), Duration::from_millis(40));
        assert_eq!(source.interval(), Duration::from_millis(40));
    }
}
