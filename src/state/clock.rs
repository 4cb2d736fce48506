//! The session's two mutually exclusive timers.
//!
//! Each armed timer is a spawned task that sleeps and then re-enters the
//! state machine through the exact entry point a manual trigger would use,
//! so autonomous and manual transitions are indistinguishable downstream.
//! Cancellation aborts the task; aborting one that already ran is
//! harmless because the entry points guard themselves.

use super::{game, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Holder for the at-most-one armed timer of each kind. Arming either
/// kind first cancels its predecessor; cancelling with nothing armed is a
/// no-op.
#[derive(Debug, Default)]
pub struct SessionClock {
    round_timer: Option<JoinHandle<()>>,
    intermission_timer: Option<JoinHandle<()>>,
}

impl SessionClock {
    /// True while a round timer is armed and has not fired.
    pub fn round_timer_armed(&self) -> bool {
        self.round_timer
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn intermission_timer_armed(&self) -> bool {
        self.intermission_timer
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn cancel_round_timer(&mut self) {
        if let Some(handle) = self.round_timer.take() {
            handle.abort();
        }
    }

    pub fn cancel_intermission_timer(&mut self) {
        if let Some(handle) = self.intermission_timer.take() {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel_round_timer();
        self.cancel_intermission_timer();
    }
}

/// Arm the answer-window timer; when it fires, the round is scored as if
/// someone had triggered scoring by hand.
pub fn arm_round_timer(state: &Arc<AppState>, clock: &mut SessionClock, seconds: u32) {
    clock.cancel_round_timer();
    let state = Arc::clone(state);
    clock.round_timer = Some(tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds as u64)).await;
        game::process_round(&state).await;
    }));
}

/// Arm the between-rounds timer; when it fires, the session advances to
/// `target_index` exactly like a manual skip.
pub fn arm_intermission_timer(
    state: &Arc<AppState>,
    clock: &mut SessionClock,
    seconds: u32,
    target_index: i64,
) {
    clock.cancel_intermission_timer();
    let state = Arc::clone(state);
    clock.intermission_timer = Some(tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds as u64)).await;
        game::advance(&state, target_index).await;
    }));
}
