//! Session history module
//!
//! Both subscribers consume the `SessionEvent` broadcast channel on the
//! tokio runtime and never touch the processing thread.

mod overlay;
mod recorder;

pub use overlay::Overlay;
pub use recorder::HistoryRecorder;
