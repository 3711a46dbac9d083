//! Session state machine
//!
//! Drives the sleep → wake → listen → sleep cycle on the processing
//! thread. The machine is the only owner of the recognition-path capture
//! stream and the only writer of `SharedSession`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::{Command, SharedSession, State, POLL_INTERVAL};
use crate::audio::{InputDevice, Microphone, Pop, BLOCK_SIZE};
use crate::config::Config;
use crate::events::{SessionEvent, TransitionReason};
use crate::recognition::{RecognitionEngine, Transcript};
use crate::skills::{DispatchOutcome, SkillDispatcher};
use crate::speech::SpeechOutputSink;
use crate::wake::{ClassifierFactory, WakeError, WakeWordDetector};

const FAREWELL: &str = "Goodbye sir, shutting down.";

/// How the voice loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// An exit phrase was spoken
    Voice,
    /// Shutdown was requested from outside
    Shutdown,
}

/// Errors that end the voice loop
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("wake word detection unavailable: {0}")]
    Wake(#[from] WakeError),
}

/// Behavior knobs taken from configuration
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub sleep_phrases: Vec<String>,
    pub exit_phrases: Vec<String>,
    pub beep_on_wake: bool,
    /// Samples per recognition frame
    pub frame_len: usize,
    /// Delay before retrying a capture device that failed to open
    pub capture_retry: Duration,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sleep_phrases: config.sleep_phrases.clone(),
            exit_phrases: config.exit_phrases.clone(),
            beep_on_wake: config.beep_on_wake,
            frame_len: BLOCK_SIZE,
            capture_retry: Duration::from_secs(1),
        }
    }
}

/// Everything the machine drives, owned by the processing thread
pub struct Collaborators {
    pub input: Arc<dyn InputDevice>,
    pub classifiers: Arc<dyn ClassifierFactory>,
    pub engine: RecognitionEngine,
    pub dispatcher: SkillDispatcher,
    pub sink: SpeechOutputSink,
}

/// What a Listening period ended with
enum ListenEnd {
    Slept,
    Exit(Exit),
}

/// What the machine does with one finalized transcript
enum Flow {
    Continue,
    Sleep,
    Exit,
}

pub struct SessionStateMachine {
    input: Arc<dyn InputDevice>,
    classifiers: Arc<dyn ClassifierFactory>,
    engine: RecognitionEngine,
    dispatcher: SkillDispatcher,
    sink: SpeechOutputSink,
    options: SessionOptions,
    session: SharedSession,
    commands: mpsc::UnboundedReceiver<Command>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionStateMachine {
    pub fn new(
        parts: Collaborators,
        options: SessionOptions,
        session: SharedSession,
        commands: mpsc::UnboundedReceiver<Command>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            input: parts.input,
            classifiers: parts.classifiers,
            engine: parts.engine,
            dispatcher: parts.dispatcher,
            sink: parts.sink,
            options,
            session,
            commands,
            event_tx,
        }
    }

    /// Run until an exit phrase, a shutdown request or a fatal error
    pub fn run(mut self) -> Result<Exit, SessionError> {
        info!("session started in Sleeping state");

        let exit = loop {
            if let Some(exit) = self.sleep_cycle()? {
                break exit;
            }
            match self.listen_cycle() {
                ListenEnd::Slept => continue,
                ListenEnd::Exit(exit) => break exit,
            }
        };

        info!(?exit, "session ended");
        self.emit(SessionEvent::Exiting {
            by_voice: exit == Exit::Voice,
        });
        Ok(exit)
    }

    /// Wait for the wake word
    ///
    /// Each attempt gets a fresh classifier and capture stream. Returns
    /// `Some` if the loop should end instead of waking.
    fn sleep_cycle(&mut self) -> Result<Option<Exit>, SessionError> {
        loop {
            let classifier = self.classifiers.create()?;
            let mut detector = WakeWordDetector::new(classifier);

            if let Err(e) = detector.start(self.input.as_ref()) {
                warn!(error = %e, "failed to start wake word capture, retrying");
                detector.close();
                if self.wait_for_shutdown(self.options.capture_retry) {
                    return Ok(Some(Exit::Shutdown));
                }
                continue;
            }

            let mut shutdown = false;
            let triggered = detector.wait_for_trigger(|| {
                shutdown = self.shutdown_requested();
                shutdown
            });
            detector.close();

            if shutdown {
                return Ok(Some(Exit::Shutdown));
            }
            if triggered {
                self.emit(SessionEvent::WakeDetected);
                return Ok(None);
            }
            warn!("wake word capture ended unexpectedly, restarting");
        }
    }

    /// One Listening period, from wake confirmation to sleep or exit
    fn listen_cycle(&mut self) -> ListenEnd {
        let mut mic = Microphone::new(Arc::clone(&self.input), self.options.frame_len);
        self.engine.reset();
        self.transition(State::Listening, TransitionReason::WakeWord);

        self.open_microphone(&mut mic);
        self.sink
            .confirm_wake(&mut mic, &self.session, self.options.beep_on_wake);

        let mut last_open_attempt = Instant::now();

        loop {
            if let Some(command) = self.next_command() {
                match command {
                    Command::Shutdown => {
                        mic.close();
                        return ListenEnd::Exit(Exit::Shutdown);
                    }
                    Command::Sleep(TransitionReason::Inactivity) if !self.session.is_idle() => {
                        debug!("activity since inactivity report, staying awake");
                    }
                    Command::Sleep(reason) => {
                        self.fall_asleep(mic, reason);
                        return ListenEnd::Slept;
                    }
                }
                continue;
            }

            match mic.queue().pop_timeout(POLL_INTERVAL) {
                Pop::Frame(frame) => {
                    let Some(transcript) = self.engine.feed(&frame) else {
                        continue;
                    };
                    match self.handle_transcript(&transcript, &mut mic) {
                        Flow::Continue => {}
                        Flow::Sleep => {
                            self.fall_asleep(mic, TransitionReason::VoiceCommand);
                            return ListenEnd::Slept;
                        }
                        Flow::Exit => {
                            self.sink.speak(FAREWELL, &mut mic, &self.session);
                            mic.close();
                            return ListenEnd::Exit(Exit::Voice);
                        }
                    }
                }
                Pop::Timeout => {
                    if !mic.is_open() && last_open_attempt.elapsed() >= self.options.capture_retry {
                        last_open_attempt = Instant::now();
                        self.open_microphone(&mut mic);
                    }
                }
                Pop::Closed => {
                    warn!("recognition queue closed while listening");
                    self.fall_asleep(mic, TransitionReason::Requested);
                    return ListenEnd::Slept;
                }
            }
        }
    }

    /// Intercept sleep and exit phrases, dispatch everything else
    ///
    /// Sleep phrases are checked first so "stop listening" sleeps rather
    /// than matching the "stop" exit phrase.
    fn handle_transcript(&mut self, transcript: &Transcript, mic: &mut Microphone) -> Flow {
        info!(text = %transcript, "user");
        self.emit(SessionEvent::Utterance {
            text: transcript.text().to_string(),
        });
        self.session.touch();

        if transcript.contains_any(&self.options.sleep_phrases) {
            return Flow::Sleep;
        }
        if transcript.contains_any(&self.options.exit_phrases) {
            info!("exit phrase recognized");
            return Flow::Exit;
        }

        let outcome = {
            let mut voice = self.sink.voice(mic, &self.session);
            self.dispatcher.dispatch(transcript.text(), &mut voice)
        };

        let handled = outcome.handled();
        let event = match outcome {
            DispatchOutcome::Unhandled => {
                info!("no skill handled the utterance");
                SessionEvent::Dispatched {
                    handled,
                    skill: None,
                    intent: None,
                    error: None,
                }
            }
            DispatchOutcome::Handled { skill, intent } => SessionEvent::Dispatched {
                handled,
                skill: Some(skill),
                intent: Some(intent),
                error: None,
            },
            DispatchOutcome::Failed {
                skill,
                intent,
                error,
            } => SessionEvent::Dispatched {
                handled,
                skill: Some(skill),
                intent: Some(intent),
                error: Some(error),
            },
        };
        self.emit(event);
        Flow::Continue
    }

    /// Listening → Sleeping: release capture, then confirm
    fn fall_asleep(&mut self, mut mic: Microphone, reason: TransitionReason) {
        self.transition(State::Sleeping, reason);
        mic.release();

        let message = match reason {
            TransitionReason::VoiceCommand => "Going to sleep. Say the wake word to activate me.",
            TransitionReason::Inactivity => "No activity detected. Going to sleep.",
            TransitionReason::Requested | TransitionReason::WakeWord => "Going to sleep.",
        };
        self.sink.speak(message, &mut mic, &self.session);
        mic.close();
    }

    fn open_microphone(&self, mic: &mut Microphone) {
        if let Err(e) = mic.open() {
            error!(error = %e, "failed to open recognition capture");
            self.emit(SessionEvent::MicrophoneLost {
                error: e.to_string(),
            });
        }
    }

    /// Perform a state transition
    fn transition(&mut self, to: State, reason: TransitionReason) {
        let from = self.session.state();
        if from == to {
            return;
        }

        let spent = match to {
            State::Listening => self.session.enter_listening(),
            State::Sleeping => self.session.enter_sleeping(),
        };
        let duration_ms = spent.as_millis() as u64;

        info!(
            from = %from,
            to = %to,
            %reason,
            duration_ms = duration_ms,
            "state transition"
        );

        self.emit(SessionEvent::StateChanged {
            from,
            to,
            reason,
            duration_ms,
        });
    }

    fn emit(&self, event: SessionEvent) {
        debug!(%event, "emitting session event");
        let _ = self.event_tx.send(event);
    }

    /// Non-blocking command read; a closed channel reads as shutdown
    fn next_command(&mut self) -> Option<Command> {
        match self.commands.try_recv() {
            Ok(command) => Some(command),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(Command::Shutdown),
        }
    }

    /// Drain commands while Sleeping; sleep requests are moot there
    fn shutdown_requested(&mut self) -> bool {
        while let Some(command) = self.next_command() {
            match command {
                Command::Shutdown => return true,
                Command::Sleep(reason) => debug!(%reason, "already sleeping, request ignored"),
            }
        }
        false
    }

    /// Sleep for `delay`, returning early with true on shutdown
    fn wait_for_shutdown(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.shutdown_requested() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            std::thread::sleep(remaining.min(POLL_INTERVAL));
        }
    }
}
