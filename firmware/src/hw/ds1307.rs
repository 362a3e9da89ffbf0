//! DS1307 battery-backed real-time clock over I2C.
//!
//! The chip keeps BCD calendar registers in 24-hour mode. The clock core
//! treats it as a UTC store; years are offset from 2000.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use clock_core::peripherals::WallClockPeripheral;
use clock_core::time::{CivilDateTime, Timestamp};
use embedded_hal::i2c::I2c;

use crate::telemetry::log_driver_error;

/// Fixed 7-bit bus address.
pub const DS1307_ADDRESS: u8 = 0x68;

const REG_SECONDS: u8 = 0x00;
const CALENDAR_LEN: usize = 7;

/// Oscillator halt flag in the seconds register.
const CLOCK_HALT: u8 = 0x80;
/// 12-hour mode flag in the hours register.
const HOUR_12: u8 = 0x40;

const BASE_YEAR: i32 = 2000;

#[derive(Debug, Eq, PartialEq)]
pub enum Ds1307Error<E> {
    Bus(E),
    /// Registers held a value no calendar can produce.
    Corrupt,
    /// The time does not fit the chip's two-digit year.
    OutOfRange,
}

impl<E> From<E> for Ds1307Error<E> {
    fn from(error: E) -> Self {
        Ds1307Error::Bus(error)
    }
}

pub struct Ds1307<I2C> {
    bus: I2C,
}

impl<I2C: I2c> Ds1307<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self { bus }
    }

    pub fn release(self) -> I2C {
        self.bus
    }

    /// Whether the oscillator is running. Fails when the chip does not answer.
    pub fn is_running(&mut self) -> Result<bool, Ds1307Error<I2C::Error>> {
        let mut seconds = [0u8; 1];
        self.bus
            .write_read(DS1307_ADDRESS, &[REG_SECONDS], &mut seconds)?;
        Ok(seconds[0] & CLOCK_HALT == 0)
    }

    pub fn datetime(&mut self) -> Result<CivilDateTime, Ds1307Error<I2C::Error>> {
        let mut regs = [0u8; CALENDAR_LEN];
        self.bus
            .write_read(DS1307_ADDRESS, &[REG_SECONDS], &mut regs)?;
        decode_calendar(&regs).ok_or(Ds1307Error::Corrupt)
    }

    /// Writes the calendar and clears the halt flag, starting the oscillator.
    pub fn set_datetime(&mut self, time: &CivilDateTime) -> Result<(), Ds1307Error<I2C::Error>> {
        let regs = encode_calendar(time).ok_or(Ds1307Error::OutOfRange)?;
        let mut frame = [0u8; CALENDAR_LEN + 1];
        frame[0] = REG_SECONDS;
        frame[1..].copy_from_slice(&regs);
        self.bus.write(DS1307_ADDRESS, &frame)?;
        Ok(())
    }
}

fn decode_calendar(regs: &[u8; CALENDAR_LEN]) -> Option<CivilDateTime> {
    if regs[2] & HOUR_12 != 0 {
        return None;
    }
    let second = from_bcd(regs[0] & !CLOCK_HALT)?;
    let minute = from_bcd(regs[1])?;
    let hour = from_bcd(regs[2] & 0x3F)?;
    let day = from_bcd(regs[4])?;
    let month = from_bcd(regs[5])?;
    let year = from_bcd(regs[6])?;

    let valid = second < 60
        && minute < 60
        && hour < 24
        && (1..=31).contains(&day)
        && (1..=12).contains(&month);
    valid.then(|| CivilDateTime::new(BASE_YEAR + i32::from(year), month, day, hour, minute, second))
}

fn encode_calendar(time: &CivilDateTime) -> Option<[u8; CALENDAR_LEN]> {
    let year = u8::try_from(time.year - BASE_YEAR).ok().filter(|year| *year < 100)?;
    // The chip numbers weekdays 1 through 7; Sunday is 1 here.
    let weekday = time.weekday().index() + 1;
    Some([
        to_bcd(time.second),
        to_bcd(time.minute),
        to_bcd(time.hour),
        weekday,
        to_bcd(time.day),
        to_bcd(time.month),
        to_bcd(year),
    ])
}

fn from_bcd(value: u8) -> Option<u8> {
    let (tens, ones) = (value >> 4, value & 0x0F);
    (tens < 10 && ones < 10).then_some(tens * 10 + ones)
}

const fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Adapts the driver to the controller's backup clock seam.
///
/// Bus failures are logged here; the controller sees an absent or unset clock.
pub struct BackupClock<I2C> {
    chip: Ds1307<I2C>,
}

impl<I2C: I2c> BackupClock<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self {
            chip: Ds1307::new(bus),
        }
    }
}

impl<I2C: I2c> WallClockPeripheral for BackupClock<I2C> {
    fn is_present_and_running(&mut self) -> bool {
        match self.chip.is_running() {
            Ok(running) => running,
            Err(error) => {
                log_driver_error("ds1307", &error);
                false
            }
        }
    }

    fn read(&mut self) -> Timestamp {
        match self.chip.datetime() {
            Ok(time) => time.to_timestamp(),
            Err(error) => {
                log_driver_error("ds1307", &error);
                Timestamp::UNSET
            }
        }
    }

    fn write(&mut self, time: Timestamp) {
        let calendar = CivilDateTime::from_timestamp(time);
        if let Err(error) = self.chip.set_datetime(&calendar) {
            log_driver_error("ds1307", &error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

    /// Register file behind a DS1307-style auto-incrementing pointer.
    struct FakeChip {
        regs: [u8; 64],
        pointer: usize,
        present: bool,
    }

    impl FakeChip {
        fn new() -> Self {
            Self {
                regs: [0; 64],
                pointer: 0,
                present: true,
            }
        }
    }

    impl ErrorType for FakeChip {
        type Error = ErrorKind;
    }

    impl I2c for FakeChip {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if !self.present || address != DS1307_ADDRESS {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => {
                        if let Some((pointer, data)) = bytes.split_first() {
                            self.pointer = usize::from(*pointer);
                            for byte in data {
                                self.regs[self.pointer % 64] = *byte;
                                self.pointer += 1;
                            }
                        }
                    }
                    Operation::Read(buffer) => {
                        for byte in buffer.iter_mut() {
                            *byte = self.regs[self.pointer % 64];
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn write_starts_oscillator_and_reads_back() {
        let mut chip = FakeChip::new();
        chip.regs[0] = CLOCK_HALT;
        let mut clock = BackupClock::new(chip);
        assert!(!clock.is_present_and_running());

        // 2024-03-31 01:30:15 UTC, a Sunday.
        let time = Timestamp::from_secs(1_711_848_615);
        clock.write(time);
        assert!(clock.is_present_and_running());
        assert_eq!(clock.read(), time);

        let chip = clock.chip.release();
        assert_eq!(&chip.regs[..7], &[0x15, 0x30, 0x01, 1, 0x31, 0x03, 0x24]);
    }

    #[test]
    fn missing_chip_reads_as_absent_and_unset() {
        let mut chip = FakeChip::new();
        chip.present = false;
        let mut clock = BackupClock::new(chip);
        assert!(!clock.is_present_and_running());
        assert_eq!(clock.read(), Timestamp::UNSET);
        clock.write(Timestamp::from_secs(1_711_848_615));
    }

    #[test]
    fn corrupt_registers_are_rejected() {
        let mut chip = FakeChip::new();
        chip.regs[..7].copy_from_slice(&[0x00, 0x61, 0x12, 1, 0x01, 0x01, 0x24]);
        let mut driver = Ds1307::new(chip);
        assert_eq!(driver.datetime(), Err(Ds1307Error::Corrupt));
    }

    #[test]
    fn twelve_hour_mode_is_rejected() {
        let mut chip = FakeChip::new();
        chip.regs[..7].copy_from_slice(&[0x00, 0x00, HOUR_12 | 0x01, 1, 0x01, 0x01, 0x24]);
        let mut driver = Ds1307::new(chip);
        assert_eq!(driver.datetime(), Err(Ds1307Error::Corrupt));
    }

    #[test]
    fn years_outside_century_are_refused() {
        let mut driver = Ds1307::new(FakeChip::new());
        let time = CivilDateTime::new(1999, 12, 31, 23, 59, 59);
        assert_eq!(driver.set_datetime(&time), Err(Ds1307Error::OutOfRange));
    }
}
