//! Spoken output with microphone exclusivity
//!
//! Input and output share hardware that cannot run both directions at
//! once without echo, so every reply releases the Listening-state capture
//! stream, renders synchronously, and builds a fresh stream afterwards if
//! the session is still Listening.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::audio::{Chime, Microphone};
use crate::events::SessionEvent;
use crate::state::{SharedSession, State};

use super::{Speak, SpeechError, SynthesizerFactory};

/// Spoken when the wake chime is disabled or cannot play
const LISTENING_PROMPT: &str = "I'm listening.";

/// Serializes all spoken replies
pub struct SpeechOutputSink {
    voice: Arc<dyn SynthesizerFactory>,
    chime: Option<Arc<dyn Chime>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SpeechOutputSink {
    pub fn new(
        voice: Arc<dyn SynthesizerFactory>,
        chime: Option<Arc<dyn Chime>>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            voice,
            chime,
            event_tx,
        }
    }

    /// Speak `text`, blocking until playback completes
    ///
    /// Synthesis failures degrade to the log line; they never stop the
    /// session.
    pub fn speak(&self, text: &str, mic: &mut Microphone, session: &SharedSession) {
        info!(%text, "assistant");
        let _ = self.event_tx.send(SessionEvent::Spoke {
            text: text.to_string(),
        });

        if let Err(e) = self.exclusive(mic, session, || self.render(text)) {
            warn!(error = %e, "speech output failed, reply was text only");
        }
    }

    /// Audible confirmation after the wake word
    pub fn confirm_wake(&self, mic: &mut Microphone, session: &SharedSession, beep: bool) {
        if beep {
            if let Some(chime) = &self.chime {
                let played = self.exclusive(mic, session, || {
                    chime
                        .play()
                        .map_err(|e| SpeechError::Render(e.to_string()))
                });
                match played {
                    Ok(()) => return,
                    Err(e) => warn!(error = %e, "wake chime failed, falling back to speech"),
                }
            }
        }
        self.speak(LISTENING_PROMPT, mic, session);
    }

    /// Borrow the sink as a `Speak` handle for skill handlers
    pub fn voice<'a>(
        &'a self,
        mic: &'a mut Microphone,
        session: &'a SharedSession,
    ) -> Voice<'a> {
        Voice {
            sink: self,
            mic,
            session,
        }
    }

    /// Run `render` with the microphone released
    fn exclusive<F>(
        &self,
        mic: &mut Microphone,
        session: &SharedSession,
        render: F,
    ) -> Result<(), SpeechError>
    where
        F: FnOnce() -> Result<(), SpeechError>,
    {
        let was_open = mic.release();
        let result = render();

        if session.state() == State::Listening {
            if let Err(e) = mic.open() {
                error!(
                    error = %e,
                    was_open,
                    "failed to restart capture, continuing without microphone"
                );
                let _ = self.event_tx.send(SessionEvent::MicrophoneLost {
                    error: e.to_string(),
                });
            }
        }

        result
    }

    /// Acquire a synthesizer for this utterance only
    fn render(&self, text: &str) -> Result<(), SpeechError> {
        let mut synthesizer = self.voice.acquire()?;
        synthesizer.render(text)
    }
}

/// Speech handle lent to skill handlers during dispatch
pub struct Voice<'a> {
    sink: &'a SpeechOutputSink,
    mic: &'a mut Microphone,
    session: &'a SharedSession,
}

impl Speak for Voice<'_> {
    fn say(&mut self, text: &str) {
        self.sink.speak(text, self.mic, self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingChime, RecordingVoice, Script, ScriptedInput};
    use std::time::Duration;

    struct Fixture {
        input: Arc<ScriptedInput>,
        voice: Arc<RecordingVoice>,
        session: SharedSession,
        events: broadcast::Receiver<SessionEvent>,
        sink: SpeechOutputSink,
    }

    fn fixture(chime: Option<Arc<RecordingChime>>) -> Fixture {
        let input = Arc::new(ScriptedInput::new(Script::new(vec![])));
        let voice = Arc::new(RecordingVoice::new(input.clone()));
        let (tx, events) = broadcast::channel(16);
        let sink = SpeechOutputSink::new(
            voice.clone(),
            chime.map(|c| c as Arc<dyn Chime>),
            tx,
        );
        Fixture {
            input,
            voice,
            session: SharedSession::new(Duration::from_secs(60)),
            events,
            sink,
        }
    }

    #[test]
    fn test_speak_releases_and_restarts_while_listening() {
        let mut f = fixture(None);
        f.session.enter_listening();
        let mut mic = Microphone::new(f.input.clone(), 16);
        mic.open().unwrap();

        f.sink.speak("It is 3:00 PM.", &mut mic, &f.session);

        assert_eq!(f.voice.spoken(), vec!["It is 3:00 PM."]);
        assert_eq!(f.voice.mic_held_during_render(), vec![false]);
        assert!(mic.is_open());
        assert_eq!(f.input.opens(), 2);
        assert_eq!(
            f.events.try_recv().unwrap(),
            SessionEvent::Spoke {
                text: "It is 3:00 PM.".into()
            }
        );
    }

    #[test]
    fn test_speak_while_sleeping_leaves_mic_closed() {
        let f = fixture(None);
        let mut mic = Microphone::new(f.input.clone(), 16);
        mic.open().unwrap();

        f.sink.speak("Going to sleep.", &mut mic, &f.session);

        assert!(!mic.is_open());
        assert!(!f.input.is_held());
    }

    #[test]
    fn test_synthesis_failure_still_restarts_capture() {
        let f = fixture(None);
        f.voice.fail_acquire();
        f.session.enter_listening();
        let mut mic = Microphone::new(f.input.clone(), 16);
        mic.open().unwrap();

        f.sink.speak("hello", &mut mic, &f.session);

        assert!(f.voice.spoken().is_empty());
        assert!(mic.is_open());
    }

    #[test]
    fn test_confirm_wake_plays_chime() {
        let chime = Arc::new(RecordingChime::default());
        let f = fixture(Some(chime.clone()));
        f.session.enter_listening();
        let mut mic = Microphone::new(f.input.clone(), 16);
        mic.open().unwrap();

        f.sink.confirm_wake(&mut mic, &f.session, true);

        assert_eq!(chime.plays(), 1);
        assert!(f.voice.spoken().is_empty());
        assert!(mic.is_open());
    }

    #[test]
    fn test_confirm_wake_speaks_without_beep() {
        let chime = Arc::new(RecordingChime::default());
        let f = fixture(Some(chime.clone()));
        f.session.enter_listening();
        let mut mic = Microphone::new(f.input.clone(), 16);

        f.sink.confirm_wake(&mut mic, &f.session, false);

        assert_eq!(chime.plays(), 0);
        assert_eq!(f.voice.spoken(), vec![LISTENING_PROMPT]);
    }

    #[test]
    fn test_failed_chime_falls_back_to_speech() {
        let chime = Arc::new(RecordingChime::failing());
        let f = fixture(Some(chime));
        f.session.enter_listening();
        let mut mic = Microphone::new(f.input.clone(), 16);

        f.sink.confirm_wake(&mut mic, &f.session, true);

        assert_eq!(f.voice.spoken(), vec![LISTENING_PROMPT]);
        assert!(mic.is_open());
    }
}
