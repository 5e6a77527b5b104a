use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::camera::types::{Size, SourceKind};
use crate::roi::crop::CropRect;

/// Callback invoked on the production thread for every published frame.
pub type FrameCallback = Arc<dyn Fn(&Arc<Frame>) + Send + Sync>;

/// A single captured frame, packed 3-channel BGR.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data (`width * height * 3`).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Assigned by the [`FrameSlot`] on publish; 0 until then.
    pub sequence: u64,
    pub source: SourceKind,
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap a device buffer. The session tags the real source on delivery.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            sequence: 0,
            source: SourceKind::Primary,
            captured_at: Instant::now(),
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == SourceKind::Synthetic
    }

    /// Get pixel at (x, y) as `[b, g, r]`.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.data.get(idx..idx + 3)?;
        Some([px[0], px[1], px[2]])
    }

    /// Copy out the sub-buffer covered by `rect`. `None` when the rectangle
    /// does not fit inside the frame.
    pub fn crop(&self, rect: &CropRect) -> Option<Frame> {
        let right = rect.x.checked_add(rect.width)?;
        let bottom = rect.y.checked_add(rect.height)?;
        if right > self.width || bottom > self.height || self.data.len() < self.size().bgr_len() {
            return None;
        }

        let stride = self.width as usize * 3;
        let row_len = rect.width as usize * 3;
        let mut cropped = Vec::with_capacity(row_len * rect.height as usize);
        for row in rect.y..bottom {
            let start = row as usize * stride + rect.x as usize * 3;
            cropped.extend_from_slice(&self.data[start..start + row_len]);
        }

        Some(Frame {
            data: cropped,
            width: rect.width,
            height: rect.height,
            sequence: self.sequence,
            source: self.source,
            captured_at: self.captured_at,
        })
    }
}

/// Single-slot "latest frame wins" hand-off.
///
/// Each publish swaps in a fresh `Arc<Frame>`; readers clone the `Arc` and
/// never observe a partially written buffer. There is no queue: a slow
/// reader simply misses frames.
pub struct FrameSlot {
    latest: Mutex<Option<Arc<Frame>>>,
    /// Monotonic counter, survives session restarts.
    sequence: AtomicU64,
    subscriber: Mutex<Option<FrameCallback>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            sequence: AtomicU64::new(0),
            subscriber: Mutex::new(None),
        }
    }

    /// Stamp the next sequence number on `frame` and make it the latest.
    pub fn publish(&self, mut frame: Frame) -> Arc<Frame> {
        frame.sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let frame = Arc::new(frame);
        *self.latest.lock() = Some(Arc::clone(&frame));

        let subscriber = self.subscriber.lock().clone();
        if let Some(cb) = subscriber {
            cb(&frame);
        }
        frame
    }

    /// The most recently published frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.lock().clone()
    }

    /// Sequence number of the latest frame (0 before the first publish).
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Register the callback invoked for every published frame.
    pub fn subscribe(&self, callback: FrameCallback) {
        *self.subscriber.lock() = Some(callback);
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// 4x3 frame where every pixel encodes its own coordinates.
    fn coordinate_frame() -> Frame {
        let mut data = Vec::new();
        for y in 0..3u8 {
            for x in 0..4u8 {
                data.extend_from_slice(&[x, y, 200]);
            }
        }
        Frame::new(data, 4, 3)
    }

    #[test]
    fn slot_returns_none_when_empty() {
        let slot = FrameSlot::new();
        assert!(slot.latest().is_none());
        assert_eq!(slot.sequence(), 0);
    }

    #[test]
    fn publish_overwrites_previous_frame() {
        let slot = FrameSlot::new();
        slot.publish(Frame::new(vec![1; 12], 2, 2));
        slot.publish(Frame::new(vec![2; 12], 2, 2));

        let latest = slot.latest().unwrap();
        assert_eq!(latest.data[0], 2);
        assert_eq!(latest.sequence, 2);
    }

    #[test]
    fn sequence_numbers_increase_monotonically() {
        let slot = FrameSlot::new();
        let seqs: Vec<u64> = (0..5)
            .map(|_| slot.publish(Frame::new(vec![0; 3], 1, 1)).sequence)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn latest_returns_arc_not_clone() {
        let slot = FrameSlot::new();
        slot.publish(Frame::new(vec![42; 3], 1, 1));

        let a = slot.latest().unwrap();
        let b = slot.latest().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn subscriber_sees_every_publish() {
        let slot = FrameSlot::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        slot.subscribe(Arc::new(move |_frame| {
            seen_clone.fetch_add(1, Ordering::Relaxed);
        }));

        slot.publish(Frame::new(vec![0; 3], 1, 1));
        slot.publish(Frame::new(vec![0; 3], 1, 1));
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn slot_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrameSlot>();
        assert_send_sync::<FrameCallback>();
    }

    // --- Crop tests ---

    #[test]
    fn crop_copies_the_covered_rows() {
        let frame = coordinate_frame();
        let rect = CropRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        };
        let cropped = frame.crop(&rect).unwrap();
        assert_eq!(cropped.size(), Size::new(2, 2));
        assert_eq!(cropped.get_pixel(0, 0), Some([1, 1, 200]));
        assert_eq!(cropped.get_pixel(1, 1), Some([2, 2, 200]));
    }

    #[test]
    fn crop_rejects_rect_past_the_edge() {
        let frame = coordinate_frame();
        let rect = CropRect {
            x: 3,
            y: 0,
            width: 2,
            height: 1,
        };
        assert!(frame.crop(&rect).is_none());
    }

    #[test]
    fn crop_keeps_sequence_and_source() {
        let mut frame = coordinate_frame();
        frame.sequence = 9;
        frame.source = SourceKind::Synthetic;
        let rect = CropRect {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        let cropped = frame.crop(&rect).unwrap();
        assert_eq!(cropped.sequence, 9);
        assert!(cropped.is_synthetic());
    }

    #[test]
    fn get_pixel_out_of_bounds_is_none() {
        let frame = coordinate_frame();
        assert_eq!(frame.get_pixel(3, 2), Some([3, 2, 200]));
        assert!(frame.get_pixel(4, 0).is_none());
    }
}
