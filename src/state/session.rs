//! Shared session state and the inactivity watchdog

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{Command, State, POLL_INTERVAL};
use crate::events::TransitionReason;

#[derive(Debug)]
struct SessionState {
    state: State,
    entered_at: Instant,
    last_activity: Instant,
    /// Zero disables auto-sleep
    timeout: Duration,
    /// Set once inactivity has been reported for the current idle stretch
    inactivity_reported: bool,
}

/// Point-in-time copy of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: State,
    pub idle_for: Duration,
    pub timeout: Duration,
}

/// Cloneable handle to the session state
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedSession {
    /// New session in Sleeping with the given inactivity budget
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                state: State::Sleeping,
                entered_at: now,
                last_activity: now,
                timeout,
                inactivity_reported: false,
            })),
        }
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Enter Listening and restart the inactivity timer
    ///
    /// Returns the time spent in the previous state.
    pub fn enter_listening(&self) -> Duration {
        self.enter(State::Listening)
    }

    /// Enter Sleeping, returning the time spent Listening
    pub fn enter_sleeping(&self) -> Duration {
        self.enter(State::Sleeping)
    }

    fn enter(&self, state: State) -> Duration {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let spent = now.duration_since(inner.entered_at);
        inner.state = state;
        inner.entered_at = now;
        inner.last_activity = now;
        inner.inactivity_reported = false;
        spent
    }

    /// Record speech activity
    pub fn touch(&self) {
        let mut inner = self.inner.lock();
        inner.last_activity = Instant::now();
        inner.inactivity_reported = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            state: inner.state,
            idle_for: inner.last_activity.elapsed(),
            timeout: inner.timeout,
        }
    }

    /// Listening with no activity for at least the timeout budget
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.lock();
        Self::idle(&inner)
    }

    fn idle(inner: &SessionState) -> bool {
        inner.state == State::Listening
            && !inner.timeout.is_zero()
            && inner.last_activity.elapsed() >= inner.timeout
    }

    /// True exactly once per idle stretch
    ///
    /// Activity or a state change re-arms the check.
    pub fn check_inactivity(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.inactivity_reported || !Self::idle(&inner) {
            return false;
        }
        inner.inactivity_reported = true;
        true
    }
}

/// Poll the session and request sleep when it has gone idle
///
/// Returns once the command channel is closed.
pub async fn watch_inactivity(session: SharedSession, commands: mpsc::UnboundedSender<Command>) {
    let mut tick = tokio::time::interval(POLL_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        if commands.is_closed() {
            debug!("inactivity watchdog stopped");
            return;
        }
        if session.check_inactivity() {
            let snapshot = session.snapshot();
            info!(
                idle_ms = snapshot.idle_for.as_millis() as u64,
                timeout_sec = snapshot.timeout.as_secs(),
                "session inactive"
            );
            if commands
                .send(Command::Sleep(TransitionReason::Inactivity))
                .is_err()
            {
                return;
            }
        }
    }
}
