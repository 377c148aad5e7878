//! Source-side types: the contract the capture-acquisition collaborator
//! fulfills when handing the engine a ready-to-consume video or image source.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A source frame with its dimensions and pixel data.
#[derive(Clone)]
pub struct SourceFrame {
    pub width: u32,
    pub height: u32,
    /// Straight (non-premultiplied) RGBA pixel data, row-major
    pub data: Vec<u8>,
}

impl SourceFrame {
    /// Create a frame from raw RGBA bytes. Returns `None` when the buffer
    /// does not match the stated dimensions or either dimension is zero.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Create a solid-color frame. Used by tests and the CLI driver.
    pub fn solid(width: u32, height: u32, r: u8, g: u8, b: u8) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as u64) * (height as u64) {
            data.extend_from_slice(&[r, g, b, 255]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Whether the frame has at least one readable pixel.
    pub fn is_readable(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }

    /// Read one pixel, returns `None` out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data
            .get(idx..idx + 4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }
}

/// Handle to stop an ongoing capture.
pub type StopHandle = Arc<AtomicBool>;

/// Receiver for source frames.
pub type FrameReceiver = mpsc::Receiver<SourceFrame>;

/// Channel capacity for live sources (~1 second of buffer at 30 fps).
pub const FRAME_CHANNEL_CAPACITY: usize = 30;

/// A ready-to-consume capture source, owned exclusively by the active
/// session from hand-off until teardown.
pub enum SourceHandle {
    /// Live stream of frames plus the flag that stops the producer
    Stream(FrameReceiver, StopHandle),
    /// Single still image (screenshot composition)
    Still(SourceFrame),
}

impl SourceHandle {
    /// Create a bounded stream pair: the sender side goes to the acquisition
    /// collaborator, the handle side to the session.
    pub fn stream() -> (mpsc::Sender<SourceFrame>, Self) {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        (tx, SourceHandle::Stream(rx, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_validates_len() {
        assert!(SourceFrame::from_rgba(2, 2, vec![0; 16]).is_some());
        assert!(SourceFrame::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(SourceFrame::from_rgba(0, 2, vec![]).is_none());
    }

    #[test]
    fn test_solid_frame_pixels() {
        let frame = SourceFrame::solid(4, 3, 10, 20, 30);
        assert!(frame.is_readable());
        assert_eq!(frame.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(frame.pixel(3, 2), Some([10, 20, 30, 255]));
        assert_eq!(frame.pixel(4, 0), None);
    }
}
