//! Wake word module
//!
//! `WakeWordDetector` drives one Sleeping cycle; the acoustic classifier is
//! a pluggable backend created fresh for every cycle.

mod detector;
#[cfg(feature = "porcupine")]
mod porcupine;

use std::sync::Arc;

use crate::config::Config;

pub use detector::{ClassifierFactory, DetectorState, WakeClassifier, WakeError, WakeWordDetector};

/// Build the configured classifier backend
#[cfg(feature = "porcupine")]
pub fn classifier_factory(
    config: &Config,
    access_key: String,
) -> Result<Arc<dyn ClassifierFactory>, WakeError> {
    let factory = porcupine::PorcupineFactory::new(
        access_key,
        &config.wake_word,
        config.wake_keyword_path.as_deref(),
        config.wake_sensitivity,
    )?;
    Ok(Arc::new(factory))
}

/// Build the configured classifier backend
#[cfg(not(feature = "porcupine"))]
pub fn classifier_factory(
    _config: &Config,
    _access_key: String,
) -> Result<Arc<dyn ClassifierFactory>, WakeError> {
    Err(WakeError::BackendUnavailable("porcupine"))
}
