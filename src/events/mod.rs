//! Events module for the session log
//!
//! The processing thread emits one `SessionEvent` per discrete occurrence
//! (wake, utterance, dispatch, reply, transition) on a broadcast channel;
//! the history recorder and the console overlay subscribe to it.

use serde::{Deserialize, Serialize};

use crate::state::State;

/// Why the session changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Wake word detected while Sleeping
    WakeWord,
    /// A sleep phrase was recognized
    VoiceCommand,
    /// No finalized utterance within the timeout budget
    Inactivity,
    /// Explicit request from outside the voice loop
    Requested,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionReason::WakeWord => write!(f, "wake word"),
            TransitionReason::VoiceCommand => write!(f, "voice command"),
            TransitionReason::Inactivity => write!(f, "inactivity"),
            TransitionReason::Requested => write!(f, "request"),
        }
    }
}

/// Events emitted by the session state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Skill registry is ready
    SkillsLoaded { skills: Vec<String> },

    /// Wake word classifier fired
    WakeDetected,

    /// Session moved between Sleeping and Listening
    StateChanged {
        from: State,
        to: State,
        reason: TransitionReason,
        /// Time spent in the previous state
        duration_ms: u64,
    },

    /// A finalized utterance was recognized
    Utterance { text: String },

    /// Result of routing an utterance to the skills
    Dispatched {
        handled: bool,
        skill: Option<String>,
        intent: Option<String>,
        /// Handler error, if the matched handler failed
        error: Option<String>,
    },

    /// The assistant spoke a reply
    Spoke { text: String },

    /// Listening-state capture could not be (re)started
    MicrophoneLost { error: String },

    /// The voice loop is terminating
    Exiting { by_voice: bool },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::SkillsLoaded { skills } if skills.is_empty() => {
                write!(f, "Skills loaded: none")
            }
            SessionEvent::SkillsLoaded { skills } => {
                write!(f, "Skills loaded: {}", skills.join(", "))
            }
            SessionEvent::WakeDetected => write!(f, "Wake word detected"),
            SessionEvent::StateChanged {
                from,
                to,
                reason,
                duration_ms,
            } => write!(f, "{from} -> {to} by {reason} (after {duration_ms}ms)"),
            SessionEvent::Utterance { text } => write!(f, "Heard: {text}"),
            SessionEvent::Dispatched {
                handled,
                skill,
                intent,
                error,
            } => {
                write!(f, "Dispatch handled={handled}")?;
                if let (Some(skill), Some(intent)) = (skill, intent) {
                    write!(f, " ({skill}/{intent})")?;
                }
                if let Some(error) = error {
                    write!(f, " failed: {error}")?;
                }
                Ok(())
            }
            SessionEvent::Spoke { text } => write!(f, "Said: {text}"),
            SessionEvent::MicrophoneLost { error } => {
                write!(f, "Microphone unavailable: {error}")
            }
            SessionEvent::Exiting { by_voice: true } => {
                write!(f, "System exiting by voice command.")
            }
            SessionEvent::Exiting { by_voice: false } => write!(f, "System shutting down."),
        }
    }
}
