//! Open a handful of desktop applications by name

use tracing::warn;

use super::launch::{spawn_first, Launch};
use super::{Intent, Skill};

#[cfg(target_os = "windows")]
mod candidates {
    use super::Launch;

    pub const NOTEPAD: &[Launch] = &[Launch::new("notepad.exe", &[])];
    pub const CALCULATOR: &[Launch] = &[Launch::new("calc.exe", &[])];
    pub const BROWSER: &[Launch] = &[
        Launch::new("chrome", &[]),
        Launch::new("cmd", &["/c", "start", "", "chrome"]),
    ];
    pub const FALLBACK_BROWSER: (&str, &[Launch]) = (
        "Microsoft Edge",
        &[Launch::new("cmd", &["/c", "start", "", "msedge"])],
    );
}

#[cfg(target_os = "macos")]
mod candidates {
    use super::Launch;

    pub const NOTEPAD: &[Launch] = &[Launch::new("open", &["-a", "TextEdit"])];
    pub const CALCULATOR: &[Launch] = &[Launch::new("open", &["-a", "Calculator"])];
    pub const BROWSER: &[Launch] = &[Launch::new("open", &["-a", "Google Chrome"])];
    pub const FALLBACK_BROWSER: (&str, &[Launch]) =
        ("Safari", &[Launch::new("open", &["-a", "Safari"])]);
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
mod candidates {
    use super::Launch;

    pub const NOTEPAD: &[Launch] = &[
        Launch::new("gnome-text-editor", &[]),
        Launch::new("gedit", &[]),
        Launch::new("kate", &[]),
        Launch::new("mousepad", &[]),
    ];
    pub const CALCULATOR: &[Launch] = &[
        Launch::new("gnome-calculator", &[]),
        Launch::new("kcalc", &[]),
        Launch::new("galculator", &[]),
    ];
    pub const BROWSER: &[Launch] = &[
        Launch::new("google-chrome", &[]),
        Launch::new("google-chrome-stable", &[]),
        Launch::new("chromium", &[]),
        Launch::new("chromium-browser", &[]),
    ];
    pub const FALLBACK_BROWSER: (&str, &[Launch]) =
        ("Firefox", &[Launch::new("firefox", &[])]);
}

pub fn skill() -> Skill {
    Skill::new(
        "open_apps",
        vec![
            Intent::new(["open notepad"], |_, speak| {
                open_app("Notepad", candidates::NOTEPAD, speak);
                Ok(())
            })
            .named("open_notepad"),
            Intent::new(["open calculator"], |_, speak| {
                open_app("Calculator", candidates::CALCULATOR, speak);
                Ok(())
            })
            .named("open_calculator"),
            Intent::new(["open chrome", "open google chrome"], |_, speak| {
                if spawn_first(candidates::BROWSER).is_some() {
                    speak.say("Opening Google Chrome.");
                    return Ok(());
                }

                let (fallback, launches) = candidates::FALLBACK_BROWSER;
                if spawn_first(launches).is_some() {
                    speak.say(&format!("Chrome was not found. Opening {fallback} instead."));
                } else {
                    warn!("no browser could be launched");
                    speak.say("I couldn't open a browser.");
                }
                Ok(())
            })
            .named("open_chrome"),
        ],
    )
}

fn open_app(name: &str, launches: &[Launch], speak: &mut dyn crate::speech::Speak) {
    if spawn_first(launches).is_some() {
        speak.say(&format!("Opening {name}, sir."));
    } else {
        warn!(app = name, "no launch candidate started");
        speak.say(&format!("I couldn't open {name}."));
    }
}
