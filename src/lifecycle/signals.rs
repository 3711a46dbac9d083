//! Signal handling
//!
//! SIGINT and SIGTERM request shutdown; SIGUSR1 asks a Listening session
//! to go back to sleep.

use tracing::debug;

use crate::events::TransitionReason;
use crate::state::Command;

/// Registered process signal handlers
#[cfg(unix)]
pub struct ProcessSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sigusr1: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ProcessSignals {
    /// Register handlers; must be called inside the tokio runtime
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sigusr1: signal(SignalKind::user_defined1())?,
        })
    }

    /// Wait for the next signal and map it to a command
    pub async fn next(&mut self) -> Command {
        tokio::select! {
            _ = self.sigterm.recv() => {
                debug!("received SIGTERM");
                Command::Shutdown
            }
            _ = self.sigint.recv() => {
                debug!("received SIGINT");
                Command::Shutdown
            }
            _ = self.sigusr1.recv() => {
                debug!("received SIGUSR1");
                Command::Sleep(TransitionReason::Requested)
            }
        }
    }
}

/// Registered process signal handlers
#[cfg(not(unix))]
pub struct ProcessSignals;

#[cfg(not(unix))]
impl ProcessSignals {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Wait for Ctrl-C; there is no sleep signal on this platform
    pub async fn next(&mut self) -> Command {
        match tokio::signal::ctrl_c().await {
            Ok(()) => debug!("received Ctrl-C"),
            Err(e) => {
                tracing::warn!(error = %e, "Ctrl-C handler failed");
                std::future::pending::<()>().await;
            }
        }
        Command::Shutdown
    }
}
