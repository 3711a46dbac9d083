//! Session state module
//!
//! The session alternates between two states:
//! - Sleeping: initial; only the wake word detector holds the microphone
//! - Listening: recognition capture is open and utterances are dispatched
//!
//! `SharedSession` is the only state shared across threads. The processing
//! thread mutates it through `SessionStateMachine`; the main thread only
//! reads it to detect inactivity.

mod machine;
mod session;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use machine::{Collaborators, Exit, SessionError, SessionOptions, SessionStateMachine};
pub use session::{watch_inactivity, SessionSnapshot, SharedSession};

use crate::events::TransitionReason;

/// Upper bound on how long a pending command or timeout goes unnoticed
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The two session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Waiting for the wake word
    #[default]
    Sleeping,
    /// Recognizing and dispatching utterances
    Listening,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Sleeping => write!(f, "Sleeping"),
            State::Listening => write!(f, "Listening"),
        }
    }
}

/// Requests delivered to the processing thread from outside the voice loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Return to Sleeping if currently Listening
    Sleep(TransitionReason),
    /// Release every device and stop the loop
    Shutdown,
}
