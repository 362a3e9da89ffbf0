//! Clock face versus sync diagnostic.

use core::fmt;

use crate::arbiter::RadioPoll;
use crate::keypad::Button;

/// What the display is currently showing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockMode {
    /// Local time, reconciled against the backup clock.
    Normal,
    /// Radio reception progress.
    SyncDisplay,
}

/// Result of applying one input to a [`ClockMode`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModeTransition {
    pub next: ClockMode,
    /// Push the adopted time to the backup clock now.
    pub force_write_through: bool,
}

impl ModeTransition {
    const fn stay(mode: ClockMode) -> Self {
        Self {
            next: mode,
            force_write_through: false,
        }
    }
}

impl ClockMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            ClockMode::Normal => ClockMode::SyncDisplay,
            ClockMode::SyncDisplay => ClockMode::Normal,
        }
    }

    /// Applies a confirmed key press; only `toggle` has an effect.
    #[must_use]
    pub fn on_button(self, button: Button, toggle: Button) -> ModeTransition {
        if button == toggle {
            ModeTransition::stay(self.toggled())
        } else {
            ModeTransition::stay(self)
        }
    }

    /// Applies this tick's radio poll. A trusted fix ends the diagnostic.
    #[must_use]
    pub const fn on_radio(self, poll: RadioPoll) -> ModeTransition {
        match self {
            ClockMode::SyncDisplay if poll.trusted_fix() => ModeTransition {
                next: ClockMode::Normal,
                force_write_through: true,
            },
            mode => ModeTransition::stay(mode),
        }
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockMode::Normal => f.write_str("normal"),
            ClockMode::SyncDisplay => f.write_str("sync-display"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_button_alternates() {
        let mut mode = ClockMode::Normal;
        for expected in [ClockMode::SyncDisplay, ClockMode::Normal, ClockMode::SyncDisplay] {
            mode = mode.on_button(Button::One, Button::One).next;
            assert_eq!(mode, expected);
        }
        assert_eq!(
            mode.on_button(Button::Three, Button::One).next,
            ClockMode::SyncDisplay
        );
    }

    #[test]
    fn trusted_fix_returns_to_normal_with_write_through() {
        let trusted = RadioPoll {
            fresh: true,
            valid: true,
            went_stale: false,
        };
        let transition = ClockMode::SyncDisplay.on_radio(trusted);
        assert_eq!(transition.next, ClockMode::Normal);
        assert!(transition.force_write_through);

        let malformed = RadioPoll {
            valid: false,
            ..trusted
        };
        assert_eq!(
            ClockMode::SyncDisplay.on_radio(malformed).next,
            ClockMode::SyncDisplay
        );
        assert!(!ClockMode::Normal.on_radio(trusted).force_write_through);
    }
}
