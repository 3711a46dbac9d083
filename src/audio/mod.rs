//! Audio module for microphone capture and short output cues
//!
//! Capture runs on the audio subsystem's real-time thread and only
//! assembles frames and pushes them into a `FrameQueue`; everything else
//! happens on the consumer side.

mod capture;
mod chime;
mod frame;
mod microphone;
mod queue;

pub use capture::{AudioError, CaptureStream, CpalInput, DeviceLease, FrameSink, InputDevice};
pub use chime::{Chime, CpalChime};
pub use frame::{Frame, BLOCK_SIZE, SAMPLE_RATE};
pub use microphone::Microphone;
pub use queue::{FrameQueue, Pop};
