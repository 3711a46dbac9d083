//! Vosk offline recognizer backend

use std::path::Path;

use vosk::{DecodingState, Model, Recognizer};

use super::engine::{Decoder, RecognitionError, Transcript};

pub struct VoskDecoder {
    recognizer: Recognizer,
    // the recognizer borrows model data for its whole life
    _model: Model,
}

impl VoskDecoder {
    pub fn new(model_path: &Path, sample_rate: u32) -> Result<Self, RecognitionError> {
        let path = model_path.to_string_lossy();
        let model = Model::new(path.as_ref())
            .ok_or_else(|| RecognitionError::ModelLoad(path.to_string()))?;
        let recognizer = Recognizer::new(&model, sample_rate as f32).ok_or_else(|| {
            RecognitionError::ModelLoad(format!("recognizer rejected {sample_rate} Hz"))
        })?;

        Ok(Self {
            recognizer,
            _model: model,
        })
    }
}

impl Decoder for VoskDecoder {
    fn accept(&mut self, pcm: &[i16]) -> Result<Option<Transcript>, RecognitionError> {
        let state = self
            .recognizer
            .accept_waveform(pcm)
            .map_err(|e| RecognitionError::Decode(e.to_string()))?;

        match state {
            DecodingState::Finalized => Ok(self
                .recognizer
                .result()
                .single()
                .map(|result| Transcript::finalized(result.text))),
            DecodingState::Running => {
                let partial = self.recognizer.partial_result();
                Ok(Some(Transcript::new(partial.partial, false)))
            }
            DecodingState::Failed => Err(RecognitionError::Decode("waveform rejected".into())),
        }
    }

    fn reset(&mut self) {
        self.recognizer.reset();
    }
}
