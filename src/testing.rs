//! Scripted audio devices and engines for driving the voice loop in tests
//!
//! Every fake frame carries a single tag repeated across its samples. The
//! tag tells the fake classifier and decoder what the frame "contains",
//! so a test scripts a conversation as a list of cues.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::audio::{AudioError, CaptureStream, Chime, DeviceLease, Frame, FrameSink, InputDevice};
use crate::recognition::{Decoder, RecognitionError, Transcript};
use crate::speech::{Speak, SpeechError, Synthesizer, SynthesizerFactory};
use crate::wake::{ClassifierFactory, WakeClassifier, WakeError};

/// Frame length the tag classifier asks for; marks a stream as wake capture
pub const WAKE_FRAME_LEN: usize = 4;

/// Frame length handed to listening streams in tests
pub const LISTEN_FRAME_LEN: usize = 16;

const TAG_NOISE: i16 = 0;
const TAG_WAKE: i16 = 1;
const TAG_GARBLED: i16 = 2;
const TAG_PARTIAL: i16 = 3;
const TAG_SAY_BASE: i16 = 100;

/// Feeder cadence for scripted streams
const FEED_INTERVAL: Duration = Duration::from_millis(2);

/// One scripted piece of audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    /// Background audio nothing reacts to
    Noise,
    /// The wake word; only delivered to wake capture
    Wake,
    /// A frame both engines fail on
    Garbled,
    /// A frame producing a non-final transcript
    Partial,
    /// A complete utterance; only delivered to listening capture
    Say(String),
}

impl Cue {
    pub fn say(text: &str) -> Self {
        Cue::Say(text.to_string())
    }
}

#[derive(Default)]
struct ScriptInner {
    cues: VecDeque<Cue>,
    texts: Vec<String>,
}

impl ScriptInner {
    fn tag(&mut self, cue: Cue) -> i16 {
        match cue {
            Cue::Noise => TAG_NOISE,
            Cue::Wake => TAG_WAKE,
            Cue::Garbled => TAG_GARBLED,
            Cue::Partial => TAG_PARTIAL,
            Cue::Say(text) => {
                self.texts.push(text);
                let index = i16::try_from(self.texts.len() - 1).unwrap_or(i16::MAX - TAG_SAY_BASE);
                TAG_SAY_BASE + index
            }
        }
    }
}

/// Shared cue list consumed by whichever stream is currently open
#[derive(Clone, Default)]
pub struct Script(Arc<Mutex<ScriptInner>>);

impl Script {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self(Arc::new(Mutex::new(ScriptInner {
            cues: cues.into(),
            texts: Vec::new(),
        })))
    }

    pub fn is_exhausted(&self) -> bool {
        self.0.lock().cues.is_empty()
    }

    /// Text scripted for a `Say` tag
    pub fn text_for(&self, tag: i16) -> Option<String> {
        let index = usize::try_from(tag.checked_sub(TAG_SAY_BASE)?).ok()?;
        self.0.lock().texts.get(index).cloned()
    }

    /// Drain every remaining cue into listening-sized frames
    pub fn frames_for_listening(&self) -> Vec<Frame> {
        let mut inner = self.0.lock();
        let cues: Vec<Cue> = inner.cues.drain(..).collect();
        cues.into_iter()
            .map(|cue| Frame::new(vec![inner.tag(cue); LISTEN_FRAME_LEN]))
            .collect()
    }

    /// Take the next cue if it may be heard by this kind of stream
    ///
    /// Cues stay in order: a stream never skips past a cue meant for the
    /// other kind of capture.
    fn next_for(&self, listening: bool) -> Option<i16> {
        let mut inner = self.0.lock();
        let deliverable = match inner.cues.front()? {
            Cue::Wake => !listening,
            Cue::Say(_) | Cue::Partial => listening,
            Cue::Noise | Cue::Garbled => true,
        };
        if !deliverable {
            return None;
        }
        let cue = inner.cues.pop_front()?;
        Some(inner.tag(cue))
    }
}

/// Input device replaying a `Script`
pub struct ScriptedInput {
    script: Script,
    held: Arc<AtomicBool>,
    opens: AtomicUsize,
    failing_opens: AtomicUsize,
    failing_listening_opens: AtomicUsize,
}

impl ScriptedInput {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            held: Arc::new(AtomicBool::new(false)),
            opens: AtomicUsize::new(0),
            failing_opens: AtomicUsize::new(0),
            failing_listening_opens: AtomicUsize::new(0),
        }
    }

    /// Successful opens so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Whether a stream currently owns the device
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn held_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.held)
    }

    /// Make the next `count` opens fail with a backend error
    pub fn fail_opens(&self, count: usize) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Like `fail_opens`, but only for recognition-sized streams
    pub fn fail_listening_opens(&self, count: usize) {
        self.failing_listening_opens.store(count, Ordering::SeqCst);
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl InputDevice for ScriptedInput {
    fn open(&self, frame_len: usize) -> Result<Box<dyn CaptureStream>, AudioError> {
        let listening = frame_len != WAKE_FRAME_LEN;
        if take_failure(&self.failing_opens)
            || (listening && take_failure(&self.failing_listening_opens))
        {
            return Err(AudioError::Backend("scripted open failure".into()));
        }

        let lease = DeviceLease::acquire(&self.held)?;
        self.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedStream {
            script: self.script.clone(),
            frame_len,
            stop: Arc::new(AtomicBool::new(false)),
            feeder: None,
            _lease: lease,
        }))
    }
}

struct ScriptedStream {
    script: Script,
    frame_len: usize,
    stop: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
    _lease: DeviceLease,
}

impl CaptureStream for ScriptedStream {
    fn start(&mut self, mut on_frame: FrameSink) -> Result<(), AudioError> {
        if self.feeder.is_some() {
            return Err(AudioError::AlreadyStarted);
        }

        let script = self.script.clone();
        let stop = Arc::clone(&self.stop);
        let frame_len = self.frame_len;
        let listening = frame_len != WAKE_FRAME_LEN;

        self.feeder = Some(thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                if let Some(tag) = script.next_for(listening) {
                    on_frame(Frame::new(vec![tag; frame_len]));
                }
                thread::sleep(FEED_INTERVAL);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Classifier firing on wake-tagged frames
#[derive(Default)]
pub struct TagClassifier;

impl WakeClassifier for TagClassifier {
    fn frame_length(&self) -> usize {
        WAKE_FRAME_LEN
    }

    fn process(&mut self, pcm: &[i16]) -> Result<bool, WakeError> {
        match pcm.first().copied() {
            Some(TAG_WAKE) => Ok(true),
            Some(TAG_GARBLED) => Err(WakeError::Process("garbled frame".into())),
            _ => Ok(false),
        }
    }
}

/// Counts every classifier it hands out
#[derive(Default)]
pub struct TagClassifierFactory {
    created: AtomicUsize,
    failing: bool,
}

impl TagClassifierFactory {
    pub fn failing() -> Self {
        Self {
            created: AtomicUsize::new(0),
            failing: true,
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ClassifierFactory for TagClassifierFactory {
    fn create(&self) -> Result<Box<dyn WakeClassifier>, WakeError> {
        if self.failing {
            return Err(WakeError::Init("invalid access key".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TagClassifier))
    }
}

/// Decoder turning `Say` tags back into their scripted text
pub struct ScriptedDecoder {
    script: Script,
    resets: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            resets: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `reset()` calls
    pub fn resets(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.resets)
    }
}

impl Decoder for ScriptedDecoder {
    fn accept(&mut self, pcm: &[i16]) -> Result<Option<Transcript>, RecognitionError> {
        match pcm.first().copied() {
            Some(TAG_GARBLED) => Err(RecognitionError::Decode("garbled frame".into())),
            Some(TAG_PARTIAL) => Ok(Some(Transcript::new("what", false))),
            Some(tag) if tag >= TAG_SAY_BASE => {
                Ok(self.script.text_for(tag).map(|text| Transcript::finalized(&text)))
            }
            _ => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct VoiceLog {
    spoken: Vec<String>,
    held_during_render: Vec<bool>,
}

/// Synthesizer factory recording each rendered reply
///
/// Also notes whether the scripted input was held while rendering, which
/// must never happen.
pub struct RecordingVoice {
    log: Arc<Mutex<VoiceLog>>,
    held: Arc<AtomicBool>,
    fail_acquire: AtomicBool,
    fail_render: Arc<AtomicBool>,
}

impl RecordingVoice {
    pub fn new(input: Arc<ScriptedInput>) -> Self {
        Self {
            log: Arc::default(),
            held: input.held_flag(),
            fail_acquire: AtomicBool::new(false),
            fail_render: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_acquire(&self) {
        self.fail_acquire.store(true, Ordering::SeqCst);
    }

    pub fn fail_render(&self) {
        self.fail_render.store(true, Ordering::SeqCst);
    }

    pub fn spoken(&self) -> Vec<String> {
        self.log.lock().spoken.clone()
    }

    pub fn mic_held_during_render(&self) -> Vec<bool> {
        self.log.lock().held_during_render.clone()
    }
}

impl SynthesizerFactory for RecordingVoice {
    fn acquire(&self) -> Result<Box<dyn Synthesizer>, SpeechError> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(SpeechError::Unavailable("no voice installed".into()));
        }
        Ok(Box::new(RecordingSynthesizer {
            log: Arc::clone(&self.log),
            held: Arc::clone(&self.held),
            fail: Arc::clone(&self.fail_render),
        }))
    }
}

struct RecordingSynthesizer {
    log: Arc<Mutex<VoiceLog>>,
    held: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl Synthesizer for RecordingSynthesizer {
    fn render(&mut self, text: &str) -> Result<(), SpeechError> {
        let mut log = self.log.lock();
        log.held_during_render.push(self.held.load(Ordering::SeqCst));
        if self.fail.load(Ordering::SeqCst) {
            return Err(SpeechError::Render("device lost".into()));
        }
        log.spoken.push(text.to_string());
        Ok(())
    }
}

/// Chime counting how often it played
#[derive(Default)]
pub struct RecordingChime {
    plays: AtomicUsize,
    failing: bool,
}

impl RecordingChime {
    pub fn failing() -> Self {
        Self {
            plays: AtomicUsize::new(0),
            failing: true,
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl Chime for RecordingChime {
    fn play(&self) -> Result<(), AudioError> {
        if self.failing {
            return Err(AudioError::NoOutputDevice);
        }
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Collects everything a handler says
#[derive(Debug, Default)]
pub struct Lines(pub Vec<String>);

impl Speak for Lines {
    fn say(&mut self, text: &str) {
        self.0.push(text.to_string());
    }
}
