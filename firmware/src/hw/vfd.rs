//! PT6311-style vacuum fluorescent display controller over SPI.
//!
//! The controller latches commands while strobe is low, so every command is
//! one SPI transaction and the device's chip select doubles as the strobe.
//! The bus must be configured LSB first.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use clock_core::display::{BrightnessLevel, DIGIT_COUNT, DisplayText};
use clock_core::peripherals::DisplayPeripheral;
use embedded_hal::spi::SpiDevice;

use crate::telemetry::log_driver_error;

/// Display mode: 8 grids by 20 segments.
const CMD_MODE_8_GRIDS: u8 = 0x03;
/// Data setting: write display RAM with auto-increment.
const CMD_DATA_WRITE: u8 = 0x40;
const CMD_ADDRESS: u8 = 0xC0;
const CMD_DISPLAY_CONTROL: u8 = 0x80;
const DISPLAY_ON: u8 = 0x08;

/// Dimming steps supported by the controller.
pub const DIM_STEPS: u8 = 8;

const BYTES_PER_GRID: usize = 3;
/// Digits occupy grids 0..4; the indicator grid follows.
const INDICATOR_GRID: usize = DIGIT_COUNT;
const RAM_LEN: usize = (INDICATOR_GRID + 1) * BYTES_PER_GRID;

const COLON_SEGMENT: u8 = 0x01;
const ALARM_SEGMENT: u8 = 0x02;

/// Seven-segment pattern with segment `a` in bit 0 through `g` in bit 6.
pub const fn glyph_segments(glyph: u8) -> u8 {
    match glyph {
        b'0' => 0x3F,
        b'1' => 0x06,
        b'2' => 0x5B,
        b'3' => 0x4F,
        b'4' => 0x66,
        b'5' => 0x6D,
        b'6' => 0x7D,
        b'7' => 0x07,
        b'8' => 0x7F,
        b'9' => 0x6F,
        b'-' => 0x40,
        _ => 0x00,
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum VfdError<E> {
    Spi(E),
}

impl<E> From<E> for VfdError<E> {
    fn from(error: E) -> Self {
        VfdError::Spi(error)
    }
}

/// Display RAM mirror plus the last control byte sent.
pub struct Vfd<SPI> {
    spi: SPI,
    ram: [u8; RAM_LEN],
    dim: u8,
    on: bool,
}

impl<SPI: SpiDevice> Vfd<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            ram: [0; RAM_LEN],
            dim: DIM_STEPS - 1,
            on: false,
        }
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    /// Selects the grid layout and blanks the RAM.
    pub fn init(&mut self) -> Result<(), VfdError<SPI::Error>> {
        self.spi.write(&[CMD_MODE_8_GRIDS])?;
        self.ram = [0; RAM_LEN];
        self.flush()
    }

    pub fn set_digits(&mut self, glyphs: &[u8; DIGIT_COUNT]) -> Result<(), VfdError<SPI::Error>> {
        for (grid, glyph) in glyphs.iter().enumerate() {
            self.ram[grid * BYTES_PER_GRID] = glyph_segments(*glyph);
        }
        self.flush()
    }

    pub fn set_indicator(&mut self, colon: bool, alarm: bool) -> Result<(), VfdError<SPI::Error>> {
        let mut bits = 0;
        if colon {
            bits |= COLON_SEGMENT;
        }
        if alarm {
            bits |= ALARM_SEGMENT;
        }
        let slot = &mut self.ram[INDICATOR_GRID * BYTES_PER_GRID];
        if *slot == bits {
            return Ok(());
        }
        *slot = bits;
        self.flush()
    }

    pub fn blank(&mut self) -> Result<(), VfdError<SPI::Error>> {
        self.ram = [0; RAM_LEN];
        self.flush()
    }

    /// Sets the dimming step (clamped) and turns the display on.
    pub fn set_dimming(&mut self, dim: u8) -> Result<(), VfdError<SPI::Error>> {
        self.dim = dim.min(DIM_STEPS - 1);
        self.on = true;
        self.control()
    }

    pub fn display_off(&mut self) -> Result<(), VfdError<SPI::Error>> {
        self.on = false;
        self.control()
    }

    fn flush(&mut self) -> Result<(), VfdError<SPI::Error>> {
        self.spi.write(&[CMD_DATA_WRITE])?;
        let mut frame = [0u8; RAM_LEN + 1];
        frame[0] = CMD_ADDRESS;
        frame[1..].copy_from_slice(&self.ram);
        self.spi.write(&frame)?;
        Ok(())
    }

    fn control(&mut self) -> Result<(), VfdError<SPI::Error>> {
        let on = if self.on { DISPLAY_ON } else { 0 };
        self.spi.write(&[CMD_DISPLAY_CONTROL | on | self.dim])?;
        Ok(())
    }
}

/// Adapts the driver to the controller's display seam.
pub struct VfdDisplay<SPI> {
    vfd: Vfd<SPI>,
    max_level: u8,
    colon: bool,
    alarm: bool,
}

impl<SPI: SpiDevice> VfdDisplay<SPI> {
    /// `max_level` is the brightest level the controller will request.
    pub fn new(spi: SPI, max_level: u8) -> Self {
        let mut vfd = Vfd::new(spi);
        if let Err(error) = vfd.init() {
            log_driver_error("vfd", &error);
        }
        Self {
            vfd,
            max_level: max_level.max(1),
            colon: false,
            alarm: false,
        }
    }

    fn dimming_for(&self, level: BrightnessLevel) -> u8 {
        let level = u16::from(level.value().min(self.max_level));
        let step = level * u16::from(DIM_STEPS - 1) / u16::from(self.max_level);
        u8::try_from(step).unwrap_or(DIM_STEPS - 1)
    }

    fn indicators(&mut self) {
        if let Err(error) = self.vfd.set_indicator(self.colon, self.alarm) {
            log_driver_error("vfd", &error);
        }
    }
}

impl<SPI: SpiDevice> DisplayPeripheral for VfdDisplay<SPI> {
    fn set_brightness(&mut self, level: BrightnessLevel) {
        let dim = self.dimming_for(level);
        if let Err(error) = self.vfd.set_dimming(dim) {
            log_driver_error("vfd", &error);
        }
    }

    fn set_blink_indicator(&mut self, on: bool) {
        self.colon = on;
        self.indicators();
    }

    fn set_alarm_indicator(&mut self, on: bool) {
        self.alarm = on;
        self.indicators();
    }

    fn write_digits(&mut self, text: &DisplayText) {
        if let Err(error) = self.vfd.set_digits(text.glyphs()) {
            log_driver_error("vfd", &error);
        }
    }

    fn clear(&mut self) {
        self.colon = false;
        self.alarm = false;
        if let Err(error) = self.vfd.blank() {
            log_driver_error("vfd", &error);
        }
    }

    fn power_off(&mut self) {
        if let Err(error) = self.vfd.display_off() {
            log_driver_error("vfd", &error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{ErrorKind, ErrorType, Operation};

    /// Records the bytes written in each strobe cycle.
    #[derive(Default)]
    struct StrobeLog {
        frames: Vec<Vec<u8>>,
        fail: bool,
    }

    impl ErrorType for StrobeLog {
        type Error = ErrorKind;
    }

    impl SpiDevice for StrobeLog {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            let mut frame = Vec::new();
            for operation in operations {
                if let Operation::Write(bytes) = operation {
                    frame.extend_from_slice(bytes);
                }
            }
            self.frames.push(frame);
            Ok(())
        }
    }

    fn display() -> VfdDisplay<StrobeLog> {
        VfdDisplay::new(StrobeLog::default(), 16)
    }

    #[test]
    fn init_selects_mode_and_blanks_ram() {
        let display = display();
        let log = display.vfd.release();
        assert_eq!(log.frames[0], vec![CMD_MODE_8_GRIDS]);
        assert_eq!(log.frames[1], vec![CMD_DATA_WRITE]);
        assert_eq!(log.frames[2].len(), RAM_LEN + 1);
        assert!(log.frames[2][1..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn digits_map_to_grid_segments() {
        let mut display = display();
        display.write_digits(&DisplayText::clock(12, 7));
        let log = display.vfd.release();
        let ram = &log.frames.last().unwrap()[1..];
        assert_eq!(ram[0], glyph_segments(b'1'));
        assert_eq!(ram[3], glyph_segments(b'2'));
        assert_eq!(ram[6], glyph_segments(b'0'));
        assert_eq!(ram[9], glyph_segments(b'7'));
    }

    #[test]
    fn brightness_scales_onto_dimming_steps() {
        let mut display = display();
        display.set_brightness(BrightnessLevel::new(16));
        display.set_brightness(BrightnessLevel::new(8));
        display.set_brightness(BrightnessLevel::new(0));
        display.power_off();
        let log = display.vfd.release();
        let controls: Vec<u8> = log.frames[3..].iter().map(|frame| frame[0]).collect();
        assert_eq!(controls, vec![0x8F, 0x8B, 0x88, 0x80]);
    }

    #[test]
    fn unchanged_indicators_are_not_rewritten() {
        let mut display = display();
        display.set_blink_indicator(true);
        let before = display.vfd.spi.frames.len();
        display.set_blink_indicator(true);
        assert_eq!(display.vfd.spi.frames.len(), before);
        display.set_alarm_indicator(true);
        let log = display.vfd.release();
        let ram = &log.frames.last().unwrap()[1..];
        assert_eq!(ram[INDICATOR_GRID * BYTES_PER_GRID], COLON_SEGMENT | ALARM_SEGMENT);
    }

    #[test]
    fn bus_errors_do_not_escape() {
        let mut display = display();
        display.vfd.spi.fail = true;
        display.write_digits(&DisplayText::UNSET);
        display.power_off();
    }
}
