//! Composites a live source stream (or a still image) into a synthetic
//! smartphone frame and encodes the result into independent MP4 and
//! alpha-WebM outputs, or a single transparent PNG for screenshots.
//!
//! The pipeline is: [`geometry`] computes the device layout from the logical
//! viewport and device pixel ratio, [`compositor`] draws one output frame per
//! tick (chassis, sampled status bar, clock and glyphs, notch, home
//! indicator), [`encoder`] feeds the composited surface to one FFmpeg process
//! per requested format, and [`session`] drives the whole lifecycle at a
//! fixed 30 fps cadence.

pub mod compositor;
pub mod encoder;
pub mod error;
pub mod geometry;
pub mod sampler;
pub mod session;
pub mod source;

pub use compositor::Compositor;
pub use encoder::{ensure_ffmpeg, ffmpeg_available, EncoderInstance};
pub use error::EngineError;
pub use geometry::{CropRect, Layout};
pub use session::{SessionController, SessionOutcome};
pub use source::{SourceFrame, SourceHandle, StopHandle};
