//! Speech synthesis through the platform's speech command
//!
//! The synthesizer process is started per utterance and waited on, so the
//! calling thread blocks until playback has finished.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use super::{SpeechError, Synthesizer, SynthesizerFactory};

/// Candidate programs, tried in order
#[cfg(target_os = "macos")]
const PROGRAMS: &[&str] = &["say"];
#[cfg(target_os = "windows")]
const PROGRAMS: &[&str] = &["powershell"];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PROGRAMS: &[&str] = &["espeak-ng", "espeak"];

/// Locates a speech command each time a reply is rendered
#[derive(Debug, Clone)]
pub struct SystemVoice {
    /// Words per minute
    rate: u32,
}

impl SystemVoice {
    pub fn new(rate: u32) -> Self {
        Self { rate }
    }
}

impl SynthesizerFactory for SystemVoice {
    fn acquire(&self) -> Result<Box<dyn Synthesizer>, SpeechError> {
        let program = PROGRAMS
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                SpeechError::Unavailable(format!("none of {} found on PATH", PROGRAMS.join(", ")))
            })?;

        Ok(Box::new(CommandSynthesizer {
            program,
            rate: self.rate,
        }))
    }
}

struct CommandSynthesizer {
    program: PathBuf,
    rate: u32,
}

impl CommandSynthesizer {
    #[cfg(target_os = "windows")]
    fn command(&self) -> Command {
        // SAPI rate runs -10..10 with 0 at roughly 160 wpm
        let rate = ((i64::from(self.rate) - 160) / 20).clamp(-10, 10);
        let mut command = Command::new(&self.program);
        command.args([
            "-NoProfile",
            "-Command",
            &format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Rate = {rate}; $s.Speak([Console]::In.ReadToEnd())"
            ),
        ]);
        command
    }

    /// `say` reads stdin when given no text
    #[cfg(target_os = "macos")]
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-r").arg(self.rate.to_string());
        command
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-s").arg(self.rate.to_string()).arg("--stdin");
        command
    }
}

impl Synthesizer for CommandSynthesizer {
    fn render(&mut self, text: &str) -> Result<(), SpeechError> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // text never goes on the command line, where a leading '-' reads as a flag
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(SpeechError::Render(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }

        debug!(program = %self.program.display(), "speech rendered");
        Ok(())
    }
}
