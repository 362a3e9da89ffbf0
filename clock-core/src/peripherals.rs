//! Collaborator traits implemented by board drivers and host simulations.

use crate::display::{BrightnessLevel, DisplayText};
use crate::time::{Millis, Timestamp};

/// Source of radio-broadcast time.
pub trait RadioTimeSource {
    /// Begins (or resumes) signal acquisition.
    fn start(&mut self);

    /// Stops acquisition so the receiver can be powered down.
    fn stop(&mut self);

    /// Returns a freshly decoded UTC time, once per decoded frame.
    ///
    /// `None` and [`Timestamp::UNSET`] both mean "no new fix".
    fn current_utc_time(&mut self) -> Option<Timestamp>;

    /// Whether the most recently completed frame passed its structural checks.
    fn is_frame_valid(&self) -> bool;

    /// Bits received so far in the frame being decoded.
    fn bits_received(&self) -> u8;

    /// Value of the most recently received bit.
    fn last_bit(&self) -> u8;
}

/// Battery-backed calendar clock.
pub trait WallClockPeripheral {
    fn is_present_and_running(&mut self) -> bool;

    /// Reads the stored time; bus failures report [`Timestamp::UNSET`].
    fn read(&mut self) -> Timestamp;

    fn write(&mut self, time: Timestamp);
}

/// Multiplexed numeric display with two indicator LEDs.
pub trait DisplayPeripheral {
    /// Applies a brightness level, powering the display back on if needed.
    fn set_brightness(&mut self, level: BrightnessLevel);

    /// Drives the colon separator.
    fn set_blink_indicator(&mut self, on: bool);

    /// Drives the "unsynced" annunciator.
    fn set_alarm_indicator(&mut self, on: bool);

    fn write_digits(&mut self, text: &DisplayText);

    fn clear(&mut self);

    fn power_off(&mut self);
}

/// UTC to local wall time conversion.
pub trait TimezoneConverter {
    fn to_local(&self, utc: Timestamp) -> Timestamp;
}

/// Paces the startup acquisition loop.
pub trait StartupPacer {
    /// Current monotonic time.
    fn now(&mut self) -> Millis;

    /// Waits between radio polls.
    fn pause(&mut self);
}
