//! Skills module for voice commands
//!
//! A skill is a named, ordered group of intents; an intent binds substring
//! patterns to a handler. The registry is built once at startup from an
//! explicit list and never changes afterwards.

mod dispatcher;
mod file_search;
mod launch;
mod open_apps;
mod open_last;
mod results;
mod time;
mod volume;
mod web_search;

use std::fmt;
use std::sync::Arc;

pub use dispatcher::{DispatchOutcome, Route, SkillDispatcher};
pub use results::{ResultStore, SearchResult};

use crate::speech::Speak;

/// Handler invoked with the normalized transcript
///
/// Returning `Err` (or panicking) counts as a failed command: the
/// dispatcher apologizes and the session carries on.
pub type Handler = Arc<dyn Fn(&str, &mut dyn Speak) -> anyhow::Result<()> + Send + Sync>;

/// Trigger patterns bound to one handler
#[derive(Clone)]
pub struct Intent {
    patterns: Vec<String>,
    handler: Handler,
    name: Option<String>,
}

impl Intent {
    /// Patterns are lower-cased; empty patterns are dropped since they
    /// would match every transcript.
    pub fn new<I, P, F>(patterns: I, handler: F) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
        F: Fn(&str, &mut dyn Speak) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.into().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            patterns,
            handler: Arc::new(handler),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for logs: the explicit name, else the first pattern
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.patterns.first().map(String::as_str))
            .unwrap_or("unnamed")
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    /// True if any pattern occurs in `text`
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| text.contains(p.as_str()))
    }
}

impl fmt::Debug for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intent")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

/// Named group of intents, matched in insertion order
#[derive(Debug, Clone)]
pub struct Skill {
    name: String,
    intents: Vec<Intent>,
}

impl Skill {
    pub fn new(name: impl Into<String>, intents: Vec<Intent>) -> Self {
        Self {
            name: name.into(),
            intents,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }
}

/// Registry of the built-in skills, in matching order
pub fn builtin() -> SkillDispatcher {
    let results = ResultStore::default();

    let mut dispatcher = SkillDispatcher::new();
    dispatcher.register(file_search::skill());
    dispatcher.register(open_apps::skill());
    dispatcher.register(open_last::skill(results.clone()));
    dispatcher.register(time::skill());
    dispatcher.register(volume::skill());
    dispatcher.register(web_search::skill(results));
    dispatcher
}
