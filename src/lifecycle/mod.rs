//! Process lifecycle: signals translated into session commands

mod signals;

pub use signals::ProcessSignals;
