use chrono::{Local, NaiveTime};

use super::{Intent, Skill};

pub fn skill() -> Skill {
    Skill::new(
        "time",
        vec![Intent::new(["what time is", "what is the time", "time"], |_, speak| {
            speak.say(&spoken_time(Local::now().time()));
            Ok(())
        })
        .named("tell_time")],
    )
}

/// "It is 3:05 PM."
fn spoken_time(time: NaiveTime) -> String {
    format!("It is {}.", time.format("%-I:%M %p"))
}
