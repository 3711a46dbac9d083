//! leo-daemon: wake-word gated voice assistant
//!
//! The daemon sleeps until the wake word is heard, then transcribes
//! utterances and routes them to built-in skills, speaking the replies.
//! It returns to sleep on a sleep phrase, on inactivity or on SIGUSR1, and
//! exits on an exit phrase or on SIGINT/SIGTERM.
//!
//! Threads:
//! - `recognition`: owns every audio device and runs the session state machine
//! - main (tokio): inactivity watchdog, signals, history log and overlay

mod audio;
mod config;
mod events;
mod history;
mod lifecycle;
mod recognition;
mod skills;
mod speech;
mod state;
#[cfg(test)]
mod testing;
mod wake;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::audio::{Chime, CpalChime, CpalInput, SAMPLE_RATE};
use crate::config::Config;
use crate::events::SessionEvent;
use crate::history::{HistoryRecorder, Overlay};
use crate::lifecycle::ProcessSignals;
use crate::speech::{SpeechOutputSink, SystemVoice};
use crate::state::{
    watch_inactivity, Collaborators, SessionOptions, SessionStateMachine, SharedSession,
};

/// Environment variable holding the wake word access key
const WAKE_ACCESS_KEY: &str = "PICOVOICE_ACCESS_KEY";

/// How long to wait for the history log to drain on exit
const HISTORY_DRAIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "leo-daemon starting");

    let config = Config::load();
    info!(
        settings = %config.settings_path().display(),
        wake_word = %config.wake_word,
        timeout_sec = config.session_timeout.as_secs(),
        "configuration loaded"
    );

    // Backends are resolved before any audio device is opened
    let access_key = config.key(WAKE_ACCESS_KEY)?;
    let engine = recognition::load(&config).context("speech recognition unavailable")?;
    let classifiers = wake::classifier_factory(&config, access_key)
        .context("wake word detection unavailable")?;

    let (event_tx, _) = broadcast::channel::<SessionEvent>(64);

    let overlay = config
        .overlay_enabled
        .then(|| tokio::spawn(Overlay.run(event_tx.subscribe())));
    let history = if config.history_enabled {
        let events = event_tx.subscribe();
        match HistoryRecorder::create(&config.history_dir).await {
            Ok(recorder) => Some(tokio::spawn(recorder.run(events))),
            Err(e) => {
                warn!(dir = %config.history_dir.display(), error = %e, "session history disabled");
                None
            }
        }
    } else {
        None
    };

    let dispatcher = skills::builtin();
    let skills = dispatcher.skill_names();
    info!(?skills, "skills loaded");
    let _ = event_tx.send(SessionEvent::SkillsLoaded { skills });

    let chime: Option<Arc<dyn Chime>> = Some(Arc::new(CpalChime));
    let sink = SpeechOutputSink::new(
        Arc::new(SystemVoice::new(config.tts_rate)),
        chime,
        event_tx.clone(),
    );

    let session = SharedSession::new(config.session_timeout);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let machine = SessionStateMachine::new(
        Collaborators {
            input: Arc::new(CpalInput::new(SAMPLE_RATE)),
            classifiers,
            engine,
            dispatcher,
            sink,
        },
        SessionOptions::from_config(&config),
        session.clone(),
        command_rx,
        event_tx.clone(),
    );

    let mut signals = ProcessSignals::new().context("failed to register signal handlers")?;

    // Run the voice loop on its own thread; it blocks on audio
    let processing = std::thread::Builder::new()
        .name("recognition".into())
        .spawn(move || machine.run())
        .context("failed to spawn recognition thread")?;
    let mut worker = tokio::task::spawn_blocking(move || processing.join());

    tokio::spawn(watch_inactivity(session, command_tx.clone()));

    info!("daemon initialized, entering main loop");

    // Main event loop
    let joined = loop {
        tokio::select! {
            command = signals.next() => {
                info!(?command, "signal received");
                if command_tx.send(command).is_err() {
                    warn!("recognition thread is no longer accepting commands");
                }
            }
            joined = &mut worker => break joined,
        }
    };
    drop(command_tx);

    let outcome = match joined {
        Ok(Ok(Ok(exit))) => {
            info!(?exit, "voice loop finished");
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "voice loop failed");
            Err(e.into())
        }
        Ok(Err(_)) => Err(anyhow::anyhow!("recognition thread panicked")),
        Err(e) => Err(anyhow::Error::new(e).context("recognition thread could not be joined")),
    };

    // Cleanup
    info!("shutting down...");
    drop(event_tx);
    if let Some(history) = history {
        if tokio::time::timeout(HISTORY_DRAIN, history).await.is_err() {
            warn!("session history did not finish writing");
        }
    }
    if let Some(overlay) = overlay {
        overlay.abort();
    }

    info!("leo-daemon stopped");
    outcome
}
