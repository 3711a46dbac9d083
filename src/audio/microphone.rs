//! Listening-state capture bound to the recognition queue

use std::sync::Arc;

use tracing::debug;

use super::capture::{AudioError, CaptureStream, InputDevice};
use super::queue::FrameQueue;

/// Capture stream feeding the recognition engine for one Listening period
///
/// The queue outlives individual streams: speech output tears the stream
/// down and builds a fresh one, while frames keep flowing into the same
/// queue. Closing the microphone closes the queue.
pub struct Microphone {
    input: Arc<dyn InputDevice>,
    queue: Arc<FrameQueue>,
    frame_len: usize,
    stream: Option<Box<dyn CaptureStream>>,
}

impl Microphone {
    pub fn new(input: Arc<dyn InputDevice>, frame_len: usize) -> Self {
        Self {
            input,
            queue: Arc::new(FrameQueue::default()),
            frame_len,
            stream: None,
        }
    }

    pub fn queue(&self) -> &FrameQueue {
        &self.queue
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Build and start a fresh stream. No-op if one is already running.
    pub fn open(&mut self) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut stream = self.input.open(self.frame_len)?;
        let queue = Arc::clone(&self.queue);
        stream.start(Box::new(move |frame| {
            queue.push(frame);
        }))?;

        self.stream = Some(stream);
        debug!("microphone open");
        Ok(())
    }

    /// Stop and drop the stream, returning whether one was open
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                debug!("microphone released");
                true
            }
            None => false,
        }
    }

    /// Release the stream and end the queue
    pub fn close(mut self) {
        self.release();
        self.queue.close();
        debug!(dropped = self.queue.dropped(), "recognition queue closed");
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.release();
        self.queue.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Pop;
    use crate::testing::{Cue, Script, ScriptedInput};
    use std::time::Duration;

    #[test]
    fn test_open_release_cycle() {
        let input = Arc::new(ScriptedInput::new(Script::new(vec![])));
        let mut mic = Microphone::new(input.clone(), 16);

        assert!(!mic.release());
        mic.open().unwrap();
        mic.open().unwrap();
        assert!(mic.is_open());
        assert_eq!(input.opens(), 1);
        assert!(input.is_held());

        assert!(mic.release());
        assert!(!input.is_held());

        mic.open().unwrap();
        assert_eq!(input.opens(), 2);

        mic.close();
        assert!(!input.is_held());
    }

    #[test]
    fn test_frames_reach_queue() {
        let script = Script::new(vec![Cue::say("hello")]);
        let input = Arc::new(ScriptedInput::new(script));
        let mut mic = Microphone::new(input, 16);
        mic.open().unwrap();

        assert!(matches!(
            mic.queue().pop_timeout(Duration::from_secs(2)),
            Pop::Frame(frame) if frame.len() == 16
        ));
    }

    #[test]
    fn test_open_fails_while_device_held() {
        let input = Arc::new(ScriptedInput::new(Script::new(vec![])));
        let mut first = Microphone::new(input.clone(), 16);
        let mut second = Microphone::new(input, 16);

        first.open().unwrap();
        assert!(matches!(second.open(), Err(AudioError::Busy)));
        assert!(!second.is_open());
    }
}
