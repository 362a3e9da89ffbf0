//! Compile-time configuration for the clock core.
//!
//! Every knob has a `const fn new()` returning the shipped default so the
//! firmware can build its configuration in a `const` context; host tools
//! override individual fields with struct update syntax.

use core::fmt;
use core::time::Duration;

use crate::keypad::{Button, MAX_BUTTONS};

/// Raw ambient-light reading treated as "fully lit".
pub const DEFAULT_MAX_LIGHT: u16 = 200;
/// Highest brightness level accepted by the display.
pub const DEFAULT_MAX_LEVEL: u8 = 16;
/// Minimum change in the light sample that triggers a recomputation.
pub const DEFAULT_LIGHT_DELTA: u16 = 10;
/// Nominal 10-bit ADC readings of the keypad ladder, in button order.
pub const DEFAULT_KEYPAD_LADDER: [u16; MAX_BUTTONS] = [0, 145, 329, 505];
/// Accepted deviation from a nominal ladder reading.
pub const DEFAULT_PRESS_TOLERANCE: u16 = 40;
/// Time a reading must stay stable before a press is confirmed.
pub const DEFAULT_PRESSED_TIME: Duration = Duration::from_millis(50);
/// Idle time after the last motion before the display is switched off.
pub const DEFAULT_STAY_ON: Duration = Duration::from_secs(60);
/// Radio silence after which a synced clock is reported stale.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(180);
/// Radio polls attempted at startup when no backup time is available.
pub const DEFAULT_STARTUP_ATTEMPTS: u16 = 2_400;
/// Pause between startup radio polls.
pub const DEFAULT_STARTUP_PAUSE: Duration = Duration::from_millis(250);
/// Scheduler period of the main loop.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Ambient light to display brightness mapping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BrightnessConfig {
    pub max_light: u16,
    pub max_level: u8,
    pub delta: u16,
}

impl BrightnessConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_light: DEFAULT_MAX_LIGHT,
            max_level: DEFAULT_MAX_LEVEL,
            delta: DEFAULT_LIGHT_DELTA,
        }
    }
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Keypad ladder and debounce timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeypadConfig {
    /// Nominal readings scanned in order; the first match wins.
    pub ladder: &'static [u16],
    pub tolerance: u16,
    pub pressed_time: Duration,
}

impl KeypadConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ladder: &DEFAULT_KEYPAD_LADDER,
            tolerance: DEFAULT_PRESS_TOLERANCE,
            pressed_time: DEFAULT_PRESSED_TIME,
        }
    }
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Motion-driven power management.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerConfig {
    pub stay_on: Duration,
    /// Suspend the processor instead of only blanking the display.
    pub deep_sleep: bool,
}

impl PowerConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stay_on: DEFAULT_STAY_ON,
            deep_sleep: false,
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Radio freshness and startup acquisition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyncConfig {
    pub sync_interval: Duration,
    pub startup_attempts: u16,
    pub startup_pause: Duration,
}

impl SyncConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            startup_attempts: DEFAULT_STARTUP_ATTEMPTS,
            startup_pause: DEFAULT_STARTUP_PAUSE,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete controller configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockConfig {
    pub brightness: BrightnessConfig,
    pub keypad: KeypadConfig,
    pub power: PowerConfig,
    pub sync: SyncConfig,
    /// Button that switches between the clock face and the sync diagnostic.
    pub toggle_button: Button,
    pub tick_interval: Duration,
}

impl ClockConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            brightness: BrightnessConfig::new(),
            keypad: KeypadConfig::new(),
            power: PowerConfig::new(),
            sync: SyncConfig::new(),
            toggle_button: Button::One,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Rejects configurations the controller cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brightness.max_light == 0 {
            return Err(ConfigError::ZeroMaxLight);
        }
        if self.brightness.max_level == 0 {
            return Err(ConfigError::ZeroMaxLevel);
        }
        if self.keypad.ladder.is_empty() || self.keypad.ladder.len() > MAX_BUTTONS {
            return Err(ConfigError::EmptyKeypadLadder);
        }
        if self.toggle_button.index() >= self.keypad.ladder.len() {
            return Err(ConfigError::ToggleButtonOutOfRange);
        }
        if self.power.stay_on.is_zero() {
            return Err(ConfigError::ZeroStayOn);
        }
        if self.sync.sync_interval.is_zero() {
            return Err(ConfigError::ZeroSyncInterval);
        }
        Ok(())
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration rejected by [`ClockConfig::validate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroMaxLight,
    ZeroMaxLevel,
    /// The ladder has no entries or more entries than there are buttons.
    EmptyKeypadLadder,
    ToggleButtonOutOfRange,
    ZeroStayOn,
    ZeroSyncInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroMaxLight => f.write_str("max light must be non-zero"),
            ConfigError::ZeroMaxLevel => f.write_str("max brightness level must be non-zero"),
            ConfigError::EmptyKeypadLadder => {
                write!(f, "keypad ladder must have 1..={MAX_BUTTONS} entries")
            }
            ConfigError::ToggleButtonOutOfRange => {
                f.write_str("toggle button is not on the keypad ladder")
            }
            ConfigError::ZeroStayOn => f.write_str("stay-on time must be non-zero"),
            ConfigError::ZeroSyncInterval => f.write_str("sync interval must be non-zero"),
        }
    }
}
