//! Motion-driven display power management.
//!
//! The motion interrupt only stamps a [`MotionCell`]; everything else runs on
//! the tick. Wake-ups are keyed on the cell's event counter changing, so an
//! idle clock cannot be woken by the millisecond counter wrapping around.

use core::fmt;

use portable_atomic::{AtomicU32, Ordering};

use crate::config::PowerConfig;
use crate::time::{Millis, duration_to_millis};

/// Display and processor power level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerMode {
    Active,
    /// Display blanked; clock logic keeps running.
    DisplayOff,
    /// Radio stopped, display powered down, processor suspended.
    DeepSleep,
}

impl PowerMode {
    /// Whether digit and brightness writes reach the display.
    #[must_use]
    pub const fn display_enabled(self) -> bool {
        matches!(self, PowerMode::Active)
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerMode::Active => f.write_str("active"),
            PowerMode::DisplayOff => f.write_str("display-off"),
            PowerMode::DeepSleep => f.write_str("deep-sleep"),
        }
    }
}

/// Motion state as seen by one tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MotionSnapshot {
    pub last_motion_at: Millis,
    /// Incremented once per motion edge.
    pub events: u32,
}

/// Interrupt-to-tick handoff for motion events.
///
/// Single writer (the motion interrupt) and single reader (the tick).
pub struct MotionCell {
    last_motion_ms: AtomicU32,
    events: AtomicU32,
}

impl MotionCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_motion_ms: AtomicU32::new(0),
            events: AtomicU32::new(0),
        }
    }

    /// Stamps a motion edge. Safe to call from interrupt context.
    pub fn record(&self, now: Millis) {
        self.last_motion_ms.store(now.raw(), Ordering::Relaxed);
        self.events.fetch_add(1, Ordering::Release);
    }

    #[must_use]
    pub fn snapshot(&self) -> MotionSnapshot {
        let events = self.events.load(Ordering::Acquire);
        MotionSnapshot {
            last_motion_at: Millis::from_raw(self.last_motion_ms.load(Ordering::Relaxed)),
            events,
        }
    }
}

impl Default for MotionCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Inputs to one power decision.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerInputs {
    /// Milliseconds since the last motion.
    pub idle_ms: u32,
    /// The event counter moved since the previous decision.
    pub new_motion: bool,
    /// The motion line is asserted right now.
    pub asserted: bool,
}

impl PowerMode {
    /// Pure transition function for one tick.
    #[must_use]
    pub const fn next(self, inputs: PowerInputs, stay_on_ms: u32, deep_sleep: bool) -> Self {
        match self {
            PowerMode::Active => {
                if !inputs.asserted && !inputs.new_motion && inputs.idle_ms > stay_on_ms {
                    if deep_sleep {
                        PowerMode::DeepSleep
                    } else {
                        PowerMode::DisplayOff
                    }
                } else {
                    PowerMode::Active
                }
            }
            PowerMode::DisplayOff | PowerMode::DeepSleep => {
                if inputs.new_motion || inputs.asserted {
                    PowerMode::Active
                } else {
                    self
                }
            }
        }
    }
}

/// Tracks motion history and the current [`PowerMode`].
#[derive(Clone, Debug)]
pub struct PowerStateMachine {
    mode: PowerMode,
    stay_on_ms: u32,
    deep_sleep: bool,
    seen_events: u32,
    last_motion_at: Millis,
}

impl PowerStateMachine {
    /// Starts active, treating `now` as the most recent motion.
    #[must_use]
    pub fn new(config: PowerConfig, now: Millis) -> Self {
        Self {
            mode: PowerMode::Active,
            stay_on_ms: duration_to_millis(config.stay_on),
            deep_sleep: config.deep_sleep,
            seen_events: 0,
            last_motion_at: now,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> PowerMode {
        self.mode
    }

    /// Whether `motion` carries an edge this machine has not consumed yet.
    #[must_use]
    pub const fn is_new_motion(&self, motion: MotionSnapshot) -> bool {
        motion.events != self.seen_events
    }

    /// Evaluates one tick and returns the new mode when it changed.
    pub fn step(
        &mut self,
        now: Millis,
        motion: MotionSnapshot,
        asserted: bool,
    ) -> Option<PowerMode> {
        let new_motion = self.consume(motion);
        if asserted {
            self.last_motion_at = now;
        }

        let inputs = PowerInputs {
            idle_ms: now.saturating_since(self.last_motion_at),
            new_motion,
            asserted,
        };
        let next = self.mode.next(inputs, self.stay_on_ms, self.deep_sleep);
        self.transition(next)
    }

    /// Counts a non-motion user interaction (a key press) as presence.
    pub fn note_activity(&mut self, now: Millis) -> Option<PowerMode> {
        self.last_motion_at = now;
        self.transition(PowerMode::Active)
    }

    /// Leaves deep sleep after the processor woke up. The waking edge is
    /// consumed by the next [`PowerStateMachine::step`].
    pub fn resume(&mut self, now: Millis) -> Option<PowerMode> {
        self.last_motion_at = now;
        self.transition(PowerMode::Active)
    }

    fn consume(&mut self, motion: MotionSnapshot) -> bool {
        if !self.is_new_motion(motion) {
            return false;
        }
        self.seen_events = motion.events;
        self.last_motion_at = motion.last_motion_at;
        true
    }

    fn transition(&mut self, next: PowerMode) -> Option<PowerMode> {
        if next == self.mode {
            return None;
        }
        self.mode = next;
        Some(next)
    }
}
