//! Picovoice Porcupine wake word backend

use std::path::{Path, PathBuf};

use porcupine::{BuiltinKeywords, Porcupine, PorcupineBuilder};

use super::detector::{ClassifierFactory, WakeClassifier, WakeError};

enum Keyword {
    Builtin(BuiltinKeywords),
    File(PathBuf),
}

/// Builds a new Porcupine handle for every Sleeping cycle
pub struct PorcupineFactory {
    access_key: String,
    keyword: Keyword,
    sensitivity: f32,
}

impl PorcupineFactory {
    pub fn new(
        access_key: String,
        wake_word: &str,
        keyword_path: Option<&Path>,
        sensitivity: f32,
    ) -> Result<Self, WakeError> {
        let keyword = match keyword_path {
            Some(path) => Keyword::File(path.to_owned()),
            None => builtin(wake_word)
                .map(Keyword::Builtin)
                .ok_or_else(|| WakeError::UnknownKeyword(wake_word.to_string()))?,
        };

        Ok(Self {
            access_key,
            keyword,
            sensitivity: sensitivity.clamp(0.0, 1.0),
        })
    }
}

impl ClassifierFactory for PorcupineFactory {
    fn create(&self) -> Result<Box<dyn WakeClassifier>, WakeError> {
        let mut builder = match &self.keyword {
            Keyword::Builtin(keyword) => PorcupineBuilder::new_with_keywords(
                self.access_key.as_str(),
                std::slice::from_ref(keyword),
            ),
            Keyword::File(path) => PorcupineBuilder::new_with_keyword_paths(
                self.access_key.as_str(),
                std::slice::from_ref(path),
            ),
        };
        builder.sensitivities(&[self.sensitivity]);

        let porcupine = builder
            .init()
            .map_err(|e| WakeError::Init(e.to_string()))?;

        tracing::debug!(
            frame_length = porcupine.frame_length(),
            sample_rate = porcupine.sample_rate(),
            "porcupine initialized"
        );

        Ok(Box::new(PorcupineClassifier { porcupine }))
    }
}

struct PorcupineClassifier {
    porcupine: Porcupine,
}

impl WakeClassifier for PorcupineClassifier {
    fn frame_length(&self) -> usize {
        self.porcupine.frame_length() as usize
    }

    fn process(&mut self, pcm: &[i16]) -> Result<bool, WakeError> {
        self.porcupine
            .process(pcm)
            .map(|index| index >= 0)
            .map_err(|e| WakeError::Process(e.to_string()))
    }
}

fn builtin(name: &str) -> Option<BuiltinKeywords> {
    let keyword = match name.trim().to_lowercase().as_str() {
        "alexa" => BuiltinKeywords::Alexa,
        "americano" => BuiltinKeywords::Americano,
        "blueberry" => BuiltinKeywords::Blueberry,
        "bumblebee" => BuiltinKeywords::Bumblebee,
        "computer" => BuiltinKeywords::Computer,
        "grapefruit" => BuiltinKeywords::Grapefruit,
        "grasshopper" => BuiltinKeywords::Grasshopper,
        "hey google" => BuiltinKeywords::HeyGoogle,
        "hey siri" => BuiltinKeywords::HeySiri,
        "jarvis" => BuiltinKeywords::Jarvis,
        "ok google" => BuiltinKeywords::OkGoogle,
        "picovoice" => BuiltinKeywords::Picovoice,
        "porcupine" => BuiltinKeywords::Porcupine,
        "terminator" => BuiltinKeywords::Terminator,
        _ => return None,
    };
    Some(keyword)
}
