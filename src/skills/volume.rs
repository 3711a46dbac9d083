//! System output volume control
//!
//! Uses `pactl` on Linux and `osascript` on macOS; other platforms answer
//! that volume control is unsupported.

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{Intent, Skill};
use crate::speech::Speak;

/// Step applied by "volume up" and "volume down"
const STEP_PERCENT: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Up,
    Down,
    Mute,
    Unmute,
    Set(u8),
}

impl Action {
    fn confirmation(self) -> String {
        match self {
            Action::Up => "Volume up.".into(),
            Action::Down => "Volume down.".into(),
            Action::Mute => "Muted.".into(),
            Action::Unmute => "Unmuted.".into(),
            Action::Set(pct) => format!("Setting volume to {pct} percent."),
        }
    }
}

pub fn skill() -> Skill {
    Skill::new(
        "volume",
        vec![
            Intent::new(["volume up", "sound up"], |_, speak| {
                apply(Action::Up, speak);
                Ok(())
            })
            .named("volume_up"),
            Intent::new(["volume down", "sound down"], |_, speak| {
                apply(Action::Down, speak);
                Ok(())
            })
            .named("volume_down"),
            Intent::new(["mute"], |_, speak| {
                apply(Action::Mute, speak);
                Ok(())
            })
            .named("mute"),
            Intent::new(["unmute"], |_, speak| {
                apply(Action::Unmute, speak);
                Ok(())
            })
            .named("unmute"),
            Intent::new(
                ["set volume to", "volume percent", "set volume"],
                |text, speak| {
                    match parse_percent(text) {
                        Some(pct) => apply(Action::Set(pct), speak),
                        None => speak.say(
                            "Tell me a percent between zero and one hundred. \
                             For example, set volume to forty percent.",
                        ),
                    }
                    Ok(())
                },
            )
            .named("set_volume_percent"),
        ],
    )
}

fn apply(action: Action, speak: &mut dyn Speak) {
    let Some(mut command) = mixer_command(action) else {
        speak.say("Volume control is not supported on this system.");
        return;
    };

    match command.status() {
        Ok(status) if status.success() => speak.say(&action.confirmation()),
        Ok(status) => {
            warn!(?action, %status, "volume command failed");
            speak.say("I couldn't change the volume on this system.");
        }
        Err(e) => {
            warn!(?action, error = %e, "volume command could not run");
            speak.say("I couldn't change the volume on this system.");
        }
    }
}

/// Percent from "set volume to 40", "volume 40 percent" or "set volume 40"
fn parse_percent(text: &str) -> Option<u8> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r"set volume to\s+(\d{1,3})\s*%?",
            r"volume\s*(\d{1,3})\s*percent",
            r"set\s*volume\s*(\d{1,3})",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    });

    let text = text.to_lowercase();
    patterns.iter().find_map(|re| {
        re.captures(&text)
            .and_then(|c| c[1].parse::<u8>().ok())
            .filter(|pct| *pct <= 100)
    })
}

#[cfg(target_os = "linux")]
fn mixer_command(action: Action) -> Option<Command> {
    let sink = "@DEFAULT_SINK@";
    let step_up = format!("+{STEP_PERCENT}%");
    let step_down = format!("-{STEP_PERCENT}%");
    let mut command = Command::new("pactl");
    match action {
        Action::Up => command.args(["set-sink-volume", sink, step_up.as_str()]),
        Action::Down => command.args(["set-sink-volume", sink, step_down.as_str()]),
        Action::Mute => command.args(["set-sink-mute", sink, "1"]),
        Action::Unmute => command.args(["set-sink-mute", sink, "0"]),
        Action::Set(pct) => command.args(["set-sink-volume", sink, format!("{pct}%").as_str()]),
    };
    Some(command)
}

#[cfg(target_os = "macos")]
fn mixer_command(action: Action) -> Option<Command> {
    let script = match action {
        Action::Up => format!(
            "set volume output volume ((output volume of (get volume settings)) + {STEP_PERCENT})"
        ),
        Action::Down => format!(
            "set volume output volume ((output volume of (get volume settings)) - {STEP_PERCENT})"
        ),
        Action::Mute => "set volume with output muted".to_string(),
        Action::Unmute => "set volume without output muted".to_string(),
        Action::Set(pct) => format!("set volume output volume {pct}"),
    };
    let mut command = Command::new("osascript");
    command.args(["-e", script.as_str()]);
    Some(command)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn mixer_command(_action: Action) -> Option<Command> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("set volume to 40"), Some(40));
        assert_eq!(parse_percent("set volume to 75 %"), Some(75));
        assert_eq!(parse_percent("volume 30 percent"), Some(30));
        assert_eq!(parse_percent("set volume 100"), Some(100));
        assert_eq!(parse_percent("set volume to 250"), None);
        assert_eq!(parse_percent("set volume to forty"), None);
    }

    #[test]
    fn test_confirmation_text() {
        assert_eq!(Action::Set(40).confirmation(), "Setting volume to 40 percent.");
        assert_eq!(Action::Mute.confirmation(), "Muted.");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pactl_arguments() {
        let command = mixer_command(Action::Set(40)).unwrap();
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(command.get_program(), "pactl");
        assert_eq!(args, ["set-sink-volume", "@DEFAULT_SINK@", "40%"]);
    }
}
