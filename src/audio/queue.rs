//! Bounded hand-off of frames from the capture callback to a consumer thread

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::frame::Frame;

/// Default queue depth (~8 seconds of audio at `BLOCK_SIZE`)
pub const DEFAULT_CAPACITY: usize = 16;

/// Result of a timed pop
#[derive(Debug)]
pub enum Pop {
    Frame(Frame),
    Timeout,
    Closed,
}

/// Thread-safe frame queue
///
/// `push` never waits for capacity: when full, the oldest frame is dropped
/// so the hardware callback returns promptly. `pop` blocks the consumer
/// until a frame arrives or the queue is closed.
pub struct FrameQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: usize,
}

struct Inner {
    frames: VecDeque<Frame>,
    closed: bool,
    dropped: u64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
                dropped: 0,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Hand off a frame. Returns false if the queue has been closed.
    pub fn push(&self, frame: Frame) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }

        if inner.frames.len() == self.capacity {
            inner.frames.pop_front();
            inner.dropped += 1;
        }
        inner.frames.push_back(frame);
        drop(inner);

        self.available.notify_one();
        true
    }

    /// Block until a frame is available; `None` signals end-of-stream
    pub fn pop(&self) -> Option<Frame> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(frame) = inner.frames.pop_front() {
                return Some(frame);
            }
            self.available.wait(&mut inner);
        }
    }

    /// Like `pop`, but gives up after `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Pop {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Pop::Closed;
            }
            if let Some(frame) = inner.frames.pop_front() {
                return Pop::Frame(frame);
            }
            if self.available.wait_until(&mut inner, deadline).timed_out() {
                if inner.closed {
                    return Pop::Closed;
                }
                return inner.frames.pop_front().map_or(Pop::Timeout, Pop::Frame);
            }
        }
    }

    /// Wake every blocked consumer; later pops report end-of-stream
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.frames.clear();
        drop(inner);

        self.available.notify_all();
    }

    /// Number of frames discarded on overflow
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
