//! Board-level configuration for the wall clock.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use clock_core::config::ClockConfig;
use clock_core::timezone::Timezone;

/// Controller tuning. The board has a backup cell, so deep sleep is allowed.
pub const CLOCK_CONFIG: ClockConfig = {
    let mut config = ClockConfig::new();
    config.power.deep_sleep = true;
    config
};

/// The radio transmitter and the clock share a zone.
pub const LOCAL_ZONE: Timezone = Timezone::central_european();

/// Standard-mode I2C for the DS1307.
pub const I2C_FREQUENCY_HZ: u32 = 100_000;

/// The PT6311 tolerates up to 1 MHz.
pub const VFD_SPI_FREQUENCY_HZ: u32 = 500_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_config_is_valid() {
        assert_eq!(CLOCK_CONFIG.validate(), Ok(()));
        assert!(CLOCK_CONFIG.power.deep_sleep);
    }
}
