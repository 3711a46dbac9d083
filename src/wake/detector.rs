//! Wake word detector lifecycle
//!
//! One detector serves exactly one Sleeping cycle: it opens its own capture
//! stream and queue, feeds every frame to a freshly created classifier and
//! is closed once the wake word fires. Classifiers are never reused.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::{AudioError, CaptureStream, Frame, FrameQueue, InputDevice, Pop};
use crate::state::POLL_INTERVAL;

/// Acoustic keyword classifier consuming raw PCM frames
pub trait WakeClassifier: Send {
    /// Samples per frame the classifier expects
    fn frame_length(&self) -> usize;

    /// Returns true when the keyword is present in this frame
    fn process(&mut self, pcm: &[i16]) -> Result<bool, WakeError>;
}

/// Creates a fresh classifier for each Sleeping cycle
pub trait ClassifierFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn WakeClassifier>, WakeError>;
}

/// Errors that can occur in wake word detection
#[derive(Debug, thiserror::Error)]
pub enum WakeError {
    #[error("failed to initialize wake word classifier: {0}")]
    Init(String),

    #[error("wake word classifier failed on frame: {0}")]
    Process(String),

    #[error("'{0}' is not a built-in wake word; set wake_keyword_path to a keyword file")]
    UnknownKeyword(String),

    #[error("built without a wake word backend; rebuild with `--features {0}`")]
    BackendUnavailable(&'static str),

    #[error("wake word detector was already started")]
    AlreadyStarted,

    #[error("wake word capture failed: {0}")]
    Audio(#[from] AudioError),
}

/// Per-attempt detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Created, no audio flowing yet
    Idle,
    /// Capture running, classifying frames
    Listening,
    /// Wake word fired; terminal for this detector
    Triggered,
}

/// Owns a classifier plus the Sleeping-state capture stream
pub struct WakeWordDetector {
    classifier: Option<Box<dyn WakeClassifier>>,
    stream: Option<Box<dyn CaptureStream>>,
    queue: Arc<FrameQueue>,
    state: DetectorState,
}

impl WakeWordDetector {
    pub fn new(classifier: Box<dyn WakeClassifier>) -> Self {
        Self {
            classifier: Some(classifier),
            stream: None,
            queue: Arc::new(FrameQueue::default()),
            state: DetectorState::Idle,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Open a capture stream on `input` and begin classifying
    pub fn start(&mut self, input: &dyn InputDevice) -> Result<(), WakeError> {
        if self.state != DetectorState::Idle {
            return Err(WakeError::AlreadyStarted);
        }
        let frame_len = self
            .classifier
            .as_ref()
            .map(|c| c.frame_length())
            .ok_or(WakeError::AlreadyStarted)?;

        let mut stream = input.open(frame_len)?;
        let queue = Arc::clone(&self.queue);
        stream.start(Box::new(move |frame| {
            queue.push(frame);
        }))?;

        self.stream = Some(stream);
        self.state = DetectorState::Listening;
        info!(frame_len, "listening for wake word");
        Ok(())
    }

    /// Block until the wake word fires
    ///
    /// `interrupted` is polled between frames; returning true abandons the
    /// wait. Returns whether the wake word was detected.
    pub fn wait_for_trigger(&mut self, mut interrupted: impl FnMut() -> bool) -> bool {
        while self.state == DetectorState::Listening {
            if interrupted() {
                debug!("wake wait interrupted");
                return false;
            }
            match self.queue.pop_timeout(POLL_INTERVAL) {
                Pop::Frame(frame) => self.classify(&frame),
                Pop::Timeout => {}
                Pop::Closed => return false,
            }
        }
        self.state == DetectorState::Triggered
    }

    fn classify(&mut self, frame: &Frame) {
        let Some(classifier) = self.classifier.as_mut() else {
            return;
        };

        match classifier.process(frame.samples()) {
            Ok(true) => {
                info!("wake word detected");
                self.state = DetectorState::Triggered;
                self.stop_stream();
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "wake classifier error, frame skipped");
            }
        }
    }

    fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }

    /// Release the classifier and the capture stream
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.stop_stream();
        self.queue.close();
        if self.classifier.take().is_some() {
            debug!("wake word detector released");
        }
    }
}

impl Drop for WakeWordDetector {
    fn drop(&mut self) {
        self.release();
    }
}
