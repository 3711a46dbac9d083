//! Speech output module
//!
//! `SpeechOutputSink` owns the stop/speak/restart contract around the
//! Listening-state microphone. Synthesizers are acquired per utterance and
//! released when the reply has been rendered.

mod sink;
mod system;

pub use sink::{SpeechOutputSink, Voice};
pub use system::SystemVoice;

/// Something a skill handler can talk through
pub trait Speak {
    fn say(&mut self, text: &str);
}

/// Renders text audibly, returning once playback has finished
pub trait Synthesizer {
    fn render(&mut self, text: &str) -> Result<(), SpeechError>;
}

/// Acquires a synthesizer for the duration of one reply
pub trait SynthesizerFactory: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn Synthesizer>, SpeechError>;
}

/// Errors that can occur while producing speech
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesizer unavailable: {0}")]
    Unavailable(String),

    #[error("speech rendering failed: {0}")]
    Render(String),

    #[error("speech process error: {0}")]
    Io(#[from] std::io::Error),
}
