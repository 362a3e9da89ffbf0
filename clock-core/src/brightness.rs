//! Ambient light to display brightness with hysteresis.

use crate::config::BrightnessConfig;
use crate::display::BrightnessLevel;

impl BrightnessConfig {
    /// Maps a raw light sample onto the brightness range: darker rooms get a
    /// dimmer display.
    #[must_use]
    pub fn level_for(&self, sample: u16) -> BrightnessLevel {
        if self.max_light == 0 {
            return BrightnessLevel::new(self.max_level);
        }
        let clamped = sample.min(self.max_light);
        let inverted = u32::from(self.max_light - clamped);
        let scaled = inverted * u32::from(self.max_level) / u32::from(self.max_light);
        BrightnessLevel::new(u8::try_from(scaled).unwrap_or(self.max_level))
    }
}

/// Tracks the light sensor and the level last applied to the display.
#[derive(Clone, Debug)]
pub struct BrightnessController {
    config: BrightnessConfig,
    previous_sample: Option<u16>,
    level: BrightnessLevel,
}

impl BrightnessController {
    /// Starts at full brightness until the first sample arrives.
    #[must_use]
    pub const fn new(config: BrightnessConfig) -> Self {
        Self {
            config,
            previous_sample: None,
            level: BrightnessLevel::new(config.max_level),
        }
    }

    #[must_use]
    pub const fn level(&self) -> BrightnessLevel {
        self.level
    }

    /// Feeds one light sample and returns the new level when it changed.
    ///
    /// Samples closer than `delta` to the previous sample are ignored.
    pub fn update(&mut self, sample: u16) -> Option<BrightnessLevel> {
        let recompute = self
            .previous_sample
            .is_none_or(|previous| sample.abs_diff(previous) >= self.config.delta);
        self.previous_sample = Some(sample);
        if !recompute {
            return None;
        }

        let level = self.config.level_for(sample);
        if level == self.level {
            return None;
        }
        self.level = level;
        Some(level)
    }
}
