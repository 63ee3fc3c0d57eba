//! Debounce state machine turning launch/exit events into suspend/resume
//! intents.
//!
//! ```text
//!            Launched (Suspend)
//!   Idle ───────────────────────▶ GameActive ◀──────┐
//!    ▲                             │    ▲          │ Launched
//!    │ settle elapsed (Resume)     │    └──────────┘ (track latest)
//!    │                             │ Exited(launcher)
//!    └──────── PendingResume ◀─────┘
//!                   │ Launched
//!                   └──────────────▶ GameActive
//! ```

use std::time::Duration;

use localai_core::{WatchEvent, WatchEventKind, WatchState};
use tokio::time::Instant;
use tracing::{debug, info};

/// Work requested from the server supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Suspend,
    Resume,
}

/// Idle / GameActive / PendingResume debouncer.
///
/// Time is passed in by the caller so the machine stays synchronous.
#[derive(Debug)]
pub struct DebounceMachine {
    state: WatchState,
    launcher: Option<String>,
    deadline: Option<Instant>,
    settle: Duration,
}

impl DebounceMachine {
    pub const fn new(settle: Duration) -> Self {
        Self {
            state: WatchState::Idle,
            launcher: None,
            deadline: None,
            settle,
        }
    }

    pub const fn state(&self) -> WatchState {
        self.state
    }

    /// Process the current game is attributed to.
    pub fn launcher(&self) -> Option<&str> {
        self.launcher.as_deref()
    }

    /// When [`on_tick`](Self::on_tick) will next produce a transition.
    pub const fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn on_event(&mut self, event: &WatchEvent, now: Instant) -> Option<Intent> {
        match (self.state, event.kind) {
            (WatchState::Idle, WatchEventKind::Launched) => {
                info!(process = %event.process, "Game launched, suspending server");
                self.enter_active(&event.process);
                Some(Intent::Suspend)
            }
            (WatchState::GameActive, WatchEventKind::Launched) => {
                debug!(process = %event.process, "Now tracking latest launch");
                self.launcher = Some(event.process.clone());
                None
            }
            (WatchState::GameActive, WatchEventKind::Exited) => {
                if self.launcher.as_deref().is_some_and(|l| event.is_for(l)) {
                    info!(
                        process = %event.process,
                        settle_secs = self.settle.as_secs(),
                        "Game exited, waiting before resuming"
                    );
                    self.state = WatchState::PendingResume;
                    self.deadline = Some(now + self.settle);
                } else {
                    debug!(process = %event.process, "Ignoring exit of untracked process");
                }
                None
            }
            (WatchState::PendingResume, WatchEventKind::Launched) => {
                info!(process = %event.process, "Relaunch during settle window, staying suspended");
                self.enter_active(&event.process);
                None
            }
            (WatchState::Idle | WatchState::PendingResume, WatchEventKind::Exited) => None,
        }
    }

    pub fn on_tick(&mut self, now: Instant) -> Option<Intent> {
        match self.deadline {
            Some(deadline) if self.state == WatchState::PendingResume && now >= deadline => {
                info!("Settle window elapsed, resuming server");
                self.state = WatchState::Idle;
                self.launcher = None;
                self.deadline = None;
                Some(Intent::Resume)
            }
            _ => None,
        }
    }

    fn enter_active(&mut self, process: &str) {
        self.state = WatchState::GameActive;
        self.launcher = Some(process.to_string());
        self.deadline = None;
    }
}
