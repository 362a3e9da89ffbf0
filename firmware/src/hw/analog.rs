//! Light sensor and keypad ladder sampling on ADC1.

#![cfg(target_os = "none")]

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::ADC1;

/// The controller thresholds assume 10-bit samples; the ADC converts at 12 bits.
const RESOLUTION_SHIFT: u8 = 2;

/// One blocking conversion per input per tick.
pub struct AnalogInputs<'d> {
    adc: Adc<'d, ADC1>,
    light: AnyAdcChannel<ADC1>,
    keypad: AnyAdcChannel<ADC1>,
}

impl<'d> AnalogInputs<'d> {
    pub fn new(
        mut adc: Adc<'d, ADC1>,
        light: AnyAdcChannel<ADC1>,
        keypad: AnyAdcChannel<ADC1>,
    ) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self { adc, light, keypad }
    }

    pub fn light(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.light) >> RESOLUTION_SHIFT
    }

    pub fn keypad(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.keypad) >> RESOLUTION_SHIFT
    }
}
