//! First-match-wins routing of transcripts to skill handlers

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, info, warn};

use crate::speech::Speak;

use super::{Intent, Skill};

/// Spoken when a matched handler fails
const APOLOGY: &str = "I faced an error running that command.";

/// The intent a transcript resolved to
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub skill: &'a Skill,
    pub intent: &'a Intent,
}

/// Result of dispatching one transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No pattern matched; nothing was spoken
    Unhandled,
    /// The matched handler completed
    Handled { skill: String, intent: String },
    /// The matched handler failed and the user was told so
    Failed {
        skill: String,
        intent: String,
        error: String,
    },
}

impl DispatchOutcome {
    /// A failed handler still consumed the transcript
    pub fn handled(&self) -> bool {
        !matches!(self, DispatchOutcome::Unhandled)
    }
}

/// Insertion-ordered skill registry
#[derive(Debug, Default)]
pub struct SkillDispatcher {
    skills: Vec<Skill>,
}

impl SkillDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a skill; duplicate names are kept and the earlier one wins
    pub fn register(&mut self, skill: Skill) {
        debug!(
            skill = skill.name(),
            intents = skill.intents().len(),
            "skill registered"
        );
        self.skills.push(skill);
    }

    pub fn skill_names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name().to_string()).collect()
    }

    /// Find the first intent with a pattern occurring in `text`
    ///
    /// Skills are scanned in registration order, intents in declaration
    /// order, patterns in list order.
    pub fn route(&self, text: &str) -> Option<Route<'_>> {
        let text = text.trim().to_lowercase();
        self.skills.iter().find_map(|skill| {
            skill
                .intents()
                .iter()
                .find(|intent| intent.matches(&text))
                .map(|intent| Route { skill, intent })
        })
    }

    /// Route `text` and run the matched handler
    pub fn dispatch(&self, text: &str, speak: &mut dyn Speak) -> DispatchOutcome {
        let normalized = text.trim().to_lowercase();
        let Some(Route { skill, intent }) = self.route(&normalized) else {
            debug!(text = %normalized, "no skill matched");
            return DispatchOutcome::Unhandled;
        };

        info!(skill = skill.name(), intent = intent.label(), "dispatching");

        let handler = intent.handler();
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&normalized, &mut *speak)));

        let error = match result {
            Ok(Ok(())) => {
                return DispatchOutcome::Handled {
                    skill: skill.name().to_string(),
                    intent: intent.label().to_string(),
                }
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic_message(panic.as_ref()),
        };

        warn!(
            skill = skill.name(),
            intent = intent.label(),
            %error,
            "skill handler failed"
        );
        speak.say(APOLOGY);

        DispatchOutcome::Failed {
            skill: skill.name().to_string(),
            intent: intent.label().to_string(),
            error,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
