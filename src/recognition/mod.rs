//! Speech recognition module
//!
//! `RecognitionEngine` is built once at startup and reused for every
//! Listening period. The decoder backend is selected at build time.

mod engine;
#[cfg(feature = "vosk")]
mod vosk;

pub use engine::{Decoder, RecognitionEngine, RecognitionError, Transcript};

use crate::config::Config;

/// Load the configured speech model
#[cfg(feature = "vosk")]
pub fn load(config: &Config) -> Result<RecognitionEngine, RecognitionError> {
    use crate::audio::SAMPLE_RATE;

    if !config.model_path.exists() {
        return Err(RecognitionError::ModelNotFound(
            config.model_path.display().to_string(),
        ));
    }

    let decoder = vosk::VoskDecoder::new(&config.model_path, SAMPLE_RATE)?;
    tracing::info!(model = %config.model_path.display(), "speech model loaded");
    Ok(RecognitionEngine::new(Box::new(decoder)))
}

/// Load the configured speech model
#[cfg(not(feature = "vosk"))]
pub fn load(_config: &Config) -> Result<RecognitionEngine, RecognitionError> {
    Err(RecognitionError::BackendUnavailable("vosk"))
}
