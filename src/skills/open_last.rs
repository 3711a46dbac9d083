use tracing::{info, warn};

use super::launch::open_url;
use super::{Intent, ResultStore, Skill};

pub fn skill(results: ResultStore) -> Skill {
    Skill::new(
        "open_last",
        vec![Intent::new(
            [
                "open it",
                "open the link",
                "open result",
                "open that",
                "open the website",
            ],
            move |_, speak| {
                let Some(last) = results.last() else {
                    speak.say("I don't have a link to open yet. Say search for something first.");
                    return Ok(());
                };

                speak.say(&format!("Opening {}.", last.title));
                match open_url(&last.url) {
                    Ok(()) => info!(url = %last.url, title = %last.title, "opened last result"),
                    Err(e) => {
                        warn!(url = %last.url, error = %e, "failed to open last result");
                        speak.say("I couldn't open the link on this system.");
                    }
                }
                Ok(())
            },
        )
        .named("open_last_result")],
    )
}
