//! Stateful speech-to-text engine
//!
//! The engine wraps a decoder that is expensive to build, so a single
//! instance lives for the whole process and is reused across every
//! Listening period.

use std::fmt;

use tracing::{debug, warn};

use crate::audio::Frame;

/// Normalized recognizer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    text: String,
    is_final: bool,
}

impl Transcript {
    /// Lower-case and trim `raw`
    pub fn new(raw: &str, is_final: bool) -> Self {
        Self {
            text: raw.trim().to_lowercase(),
            is_final,
        }
    }

    pub fn finalized(raw: &str) -> Self {
        Self::new(raw, true)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True if any phrase occurs in the text
    pub fn contains_any<S: AsRef<str>>(&self, phrases: &[S]) -> bool {
        phrases
            .iter()
            .any(|p| !p.as_ref().is_empty() && self.text.contains(&p.as_ref().to_lowercase()))
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Errors that can occur in speech recognition
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("speech model not found at {0}")]
    ModelNotFound(String),

    #[error("failed to load speech model: {0}")]
    ModelLoad(String),

    #[error("decoder rejected audio: {0}")]
    Decode(String),

    #[error("built without a speech recognition backend; rebuild with `--features {0}`")]
    BackendUnavailable(&'static str),
}

/// Incremental decoder accumulating acoustic evidence
pub trait Decoder: Send {
    /// Feed PCM samples; returns a transcript at an utterance boundary
    ///
    /// Partial results may be returned with `is_final() == false`.
    fn accept(&mut self, pcm: &[i16]) -> Result<Option<Transcript>, RecognitionError>;

    /// Discard any partially decoded utterance
    fn reset(&mut self);
}

/// Process-lifetime recognition engine
pub struct RecognitionEngine {
    decoder: Box<dyn Decoder>,
}

impl RecognitionEngine {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Self { decoder }
    }

    /// Feed one frame, returning a finalized non-empty transcript if the
    /// decoder closed an utterance
    ///
    /// Decode errors skip the frame.
    pub fn feed(&mut self, frame: &Frame) -> Option<Transcript> {
        match self.decoder.accept(frame.samples()) {
            Ok(Some(transcript)) if transcript.is_final() && !transcript.is_empty() => {
                debug!(text = %transcript, "utterance finalized");
                Some(transcript)
            }
            Ok(Some(partial)) => {
                if !partial.is_empty() {
                    debug!(text = %partial, "partial result");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "decode error, frame skipped");
                None
            }
        }
    }

    /// Drop decoder state left over from the last Listening period
    pub fn reset(&mut self) {
        self.decoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Cue, Script, ScriptedDecoder};

    #[test]
    fn test_transcript_normalization() {
        let transcript = Transcript::finalized("  What Time Is It \n");
        assert_eq!(transcript.text(), "what time is it");
        assert!(transcript.is_final());
        assert!(!transcript.is_empty());
        assert!(Transcript::finalized("   ").is_empty());
    }

    #[test]
    fn test_contains_any_is_substring_match() {
        let transcript = Transcript::finalized("please stop listening now");
        assert!(transcript.contains_any(&["stop listening"]));
        assert!(transcript.contains_any(&["STOP"]));
        assert!(!transcript.contains_any(&["go to sleep", ""]));
    }

    #[test]
    fn test_feed_returns_only_final_transcripts() {
        let script = Script::new(vec![
            Cue::say("what time is it"),
            Cue::Garbled,
            Cue::Partial,
            Cue::say("   "),
        ]);
        let mut engine = RecognitionEngine::new(Box::new(ScriptedDecoder::new(script.clone())));

        let frames = script.frames_for_listening();
        assert_eq!(
            engine.feed(&frames[0]),
            Some(Transcript::finalized("what time is it"))
        );
        // decode error is swallowed
        assert_eq!(engine.feed(&frames[1]), None);
        // partial results are not surfaced
        assert_eq!(engine.feed(&frames[2]), None);
        // empty utterances are dropped
        assert_eq!(engine.feed(&frames[3]), None);
    }
}
