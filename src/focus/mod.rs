// Focus direction: which driver the detailed telemetry and coaching panels
// follow.

use std::time::{Duration, Instant};

use log::debug;

/// Default cooldown before auto-focus re-engages after a manual selection.
pub const DEFAULT_FOCUS_COOLDOWN_S: u64 = 25;

/// Keeps the selected-driver pointer in sync with the race.
///
/// With auto-focus engaged the selection is pinned to whichever driver holds
/// position 1, re-evaluated whenever the roster or flag changes. A manual
/// selection disengages auto-focus for a cooldown window; the pending
/// re-enable is represented as a single deadline, so a newer selection
/// overwrites (and thereby cancels) the older one and two timers can never
/// fight over the focus lock.
#[derive(Debug)]
pub struct FocusDirector {
    selected: Option<String>,
    auto_focus: bool,
    manual_hold_until: Option<Instant>,
    cooldown: Duration,
}

impl Default for FocusDirector {
    fn default() -> Self {
        FocusDirector::new(Duration::from_secs(DEFAULT_FOCUS_COOLDOWN_S))
    }
}

impl FocusDirector {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            selected: None,
            auto_focus: true,
            manual_hold_until: None,
            cooldown,
        }
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn auto_focus_active(&self) -> bool {
        self.auto_focus
    }

    /// Manually pin focus to a driver, disengaging auto-focus until the
    /// cooldown elapses.
    pub fn select_manual(&mut self, id: &str, now: Instant) {
        debug!("Manual camera selection: {id}");
        self.selected = Some(id.to_string());
        self.auto_focus = false;
        self.manual_hold_until = Some(now + self.cooldown);
    }

    /// Drop the selection if it points at the given driver (roster removal).
    pub fn deselect(&mut self, id: &str) {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
    }

    /// Re-evaluate focus against the current leader.
    ///
    /// Returns `true` when the selected driver changed, which the caller
    /// uses to drop stale coaching signals.
    pub fn refresh(&mut self, leader_id: Option<&str>, now: Instant) -> bool {
        if let Some(deadline) = self.manual_hold_until
            && now >= deadline
        {
            debug!("Manual selection cooldown elapsed, auto-focus re-engaged");
            self.auto_focus = true;
            self.manual_hold_until = None;
        }

        if self.auto_focus
            && let Some(leader_id) = leader_id
            && self.selected.as_deref() != Some(leader_id)
        {
            self.selected = Some(leader_id.to_string());
            return true;
        }
        false
    }
}
