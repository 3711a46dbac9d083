//! Console status banners

use tokio::sync::broadcast;
use tracing::warn;

use crate::events::SessionEvent;
use crate::state::State;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";

const LISTENING: &str = "LISTENING...";
const SLEEPING: &str = "SLEEPING (Say wake word)...";

/// Prints a banner whenever the session changes state
pub struct Overlay;

impl Overlay {
    /// Show the initial Sleeping banner, then follow state changes
    pub async fn run(self, mut events: broadcast::Receiver<SessionEvent>) {
        println!("{}", banner_for(State::Sleeping));
        loop {
            match events.recv().await {
                Ok(SessionEvent::StateChanged { to, .. }) => println!("{}", banner_for(to)),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "overlay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn banner_for(state: State) -> String {
    match state {
        State::Listening => banner(LISTENING, GREEN),
        State::Sleeping => banner(SLEEPING, YELLOW),
    }
}

fn banner(text: &str, color: &str) -> String {
    let line = "═".repeat(text.chars().count() + 2);
    format!("{color}{BOLD}╔{line}╗\n║ {text} ║\n╚{line}╝{RESET}")
}
