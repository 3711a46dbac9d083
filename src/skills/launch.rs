//! Launching desktop programs and opening files or links

use std::io;
use std::path::Path;
use std::process::Command;
use std::thread;

use tracing::{debug, warn};

/// A program plus arguments to try
#[derive(Debug, Clone, Copy)]
pub struct Launch {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl Launch {
    pub const fn new(program: &'static str, args: &'static [&'static str]) -> Self {
        Self { program, args }
    }
}

/// Spawn the first candidate that starts, returning it
pub fn spawn_first(candidates: &[Launch]) -> Option<Launch> {
    candidates.iter().copied().find(|launch| {
        let mut command = Command::new(launch.program);
        command.args(launch.args);
        match spawn_detached(&mut command) {
            Ok(_) => {
                debug!(program = launch.program, "launched");
                true
            }
            Err(e) => {
                debug!(program = launch.program, error = %e, "launch candidate failed");
                false
            }
        }
    })
}

/// Open a file with its default application
pub fn open_path(path: &Path) -> io::Result<()> {
    spawn_detached(opener().arg(path))?;
    Ok(())
}

/// Open an http(s) link in the default browser
pub fn open_url(url: &str) -> anyhow::Result<()> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        anyhow::bail!("refusing to open non-http link: {url}");
    }
    spawn_detached(opener().arg(url))?;
    Ok(())
}

/// Start `command` without waiting on it, returning its pid
///
/// A thread waits on the child so it is reaped once it exits.
fn spawn_detached(command: &mut Command) -> io::Result<u32> {
    let mut child = command.spawn()?;
    let pid = child.id();
    let program = command.get_program().to_string_lossy().into_owned();

    thread::Builder::new()
        .name("launch-reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) => debug!(%program, pid, %status, "launched process exited"),
            Err(e) => warn!(%program, pid, error = %e, "could not wait on launched process"),
        })?;
    Ok(pid)
}

#[cfg(target_os = "macos")]
fn opener() -> Command {
    Command::new("open")
}

#[cfg(target_os = "windows")]
fn opener() -> Command {
    // empty title keeps `start` from treating the target as a window title
    let mut command = Command::new("cmd");
    command.args(["/c", "start", ""]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener() -> Command {
    Command::new("xdg-open")
}
