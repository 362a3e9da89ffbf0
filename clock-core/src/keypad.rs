//! Resistor-ladder keypad decoding.
//!
//! All buttons share one analog channel; each produces a distinct nominal
//! reading. [`InputDecoder`] classifies a sample against the ladder and runs a
//! small debounce state machine so a held button fires exactly once.

use core::fmt;

use crate::config::KeypadConfig;
use crate::time::{Millis, duration_to_millis};

/// Maximum number of buttons the ladder can describe.
pub const MAX_BUTTONS: usize = 4;

/// Physical keypad buttons in ladder order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Button {
    One,
    Two,
    Three,
    Four,
}

impl Button {
    /// Zero-based position on the ladder.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Button::One => 0,
            Button::Two => 1,
            Button::Three => 2,
            Button::Four => 3,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Button::One),
            1 => Some(Button::Two),
            2 => Some(Button::Three),
            3 => Some(Button::Four),
            _ => None,
        }
    }

    /// One-based number as printed on the front panel.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Button::One => 1,
            Button::Two => 2,
            Button::Three => 3,
            Button::Four => 4,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "button-{}", self.number())
    }
}

/// Debounce progress for the most recent classification.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DebounceState {
    /// No button under the finger.
    Idle,
    /// A button is reading steadily but has not been held long enough.
    Candidate(Button),
    /// The press was reported; nothing fires again until the ladder reads
    /// idle, even if the reading slides to another button.
    Confirmed(Button),
}

impl DebounceState {
    /// Button currently read from the ladder, whether confirmed or not.
    #[must_use]
    pub const fn button(self) -> Option<Button> {
        match self {
            DebounceState::Idle => None,
            DebounceState::Candidate(button) | DebounceState::Confirmed(button) => Some(button),
        }
    }
}

/// Edge-triggered keypad decoder.
#[derive(Clone, Debug)]
pub struct InputDecoder {
    config: KeypadConfig,
    pressed_ms: u32,
    state: DebounceState,
    changed_at: Millis,
}

impl InputDecoder {
    #[must_use]
    pub fn new(config: KeypadConfig) -> Self {
        Self {
            config,
            pressed_ms: duration_to_millis(config.pressed_time),
            state: DebounceState::Idle,
            changed_at: Millis::ZERO,
        }
    }

    #[must_use]
    pub const fn state(&self) -> DebounceState {
        self.state
    }

    /// Maps a raw sample onto the first ladder entry within tolerance.
    #[must_use]
    pub fn classify(&self, sample: u16) -> Option<Button> {
        self.config
            .ladder
            .iter()
            .position(|&nominal| sample.abs_diff(nominal) <= self.config.tolerance)
            .and_then(Button::from_index)
    }

    /// Feeds one sample and returns a button the first time its press is
    /// confirmed.
    pub fn update(&mut self, sample: u16, now: Millis) -> Option<Button> {
        let reading = self.classify(sample);
        // A confirmed press stays latched until the ladder reads idle again.
        let latched = matches!(self.state, DebounceState::Confirmed(_)) && reading.is_some();
        if !latched && reading != self.state.button() {
            self.changed_at = now;
            self.state = reading.map_or(DebounceState::Idle, DebounceState::Candidate);
        }

        if let DebounceState::Candidate(button) = self.state
            && now.wrapping_since(self.changed_at) >= self.pressed_ms
        {
            self.state = DebounceState::Confirmed(button);
            return Some(button);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> InputDecoder {
        InputDecoder::new(KeypadConfig::new())
    }

    fn feed(decoder: &mut InputDecoder, sample: u16, from_ms: u32, to_ms: u32, step: u32) -> u8 {
        let mut fired = 0;
        let mut at = from_ms;
        while at <= to_ms {
            if decoder.update(sample, Millis::from_raw(at)).is_some() {
                fired += 1;
            }
            at += step;
        }
        fired
    }

    #[test]
    fn classifies_ladder_within_tolerance() {
        let decoder = decoder();
        assert_eq!(decoder.classify(0), Some(Button::One));
        assert_eq!(decoder.classify(180), Some(Button::Two));
        assert_eq!(decoder.classify(290), Some(Button::Three));
        assert_eq!(decoder.classify(545), Some(Button::Four));
        assert_eq!(decoder.classify(240), None);
        assert_eq!(decoder.classify(1_023), None);
    }

    #[test]
    fn held_press_fires_once() {
        let mut decoder = decoder();
        assert_eq!(feed(&mut decoder, 145, 0, 2_000, 5), 1);
        assert_eq!(decoder.state(), DebounceState::Confirmed(Button::Two));
    }

    #[test]
    fn short_blip_never_fires() {
        let mut decoder = decoder();
        assert_eq!(feed(&mut decoder, 329, 0, 40, 10), 0);
        assert_eq!(feed(&mut decoder, 1_023, 50, 200, 10), 0);
        assert_eq!(decoder.state(), DebounceState::Idle);
    }

    #[test]
    fn each_press_release_cycle_fires_once() {
        for step in [1, 7, 25, 50] {
            let mut decoder = decoder();
            let mut fired = 0;
            let mut start = 0;
            for _ in 0..3 {
                fired += feed(&mut decoder, 505, start, start + 200, step);
                fired += feed(&mut decoder, 1_023, start + 201, start + 400, step);
                start += 401;
            }
            assert_eq!(fired, 3, "poll step {step} ms");
        }
    }

    #[test]
    fn changing_button_while_held_restarts_debounce() {
        let mut decoder = decoder();
        assert_eq!(decoder.update(0, Millis::from_raw(0)), None);
        assert_eq!(decoder.update(145, Millis::from_raw(30)), None);
        assert_eq!(decoder.update(145, Millis::from_raw(60)), None);
        assert_eq!(
            decoder.update(145, Millis::from_raw(80)),
            Some(Button::Two)
        );
    }

    #[test]
    fn sliding_to_another_button_without_release_stays_latched() {
        let mut decoder = decoder();
        assert_eq!(feed(&mut decoder, 0, 0, 200, 10), 1);
        assert_eq!(decoder.state(), DebounceState::Confirmed(Button::One));

        assert_eq!(feed(&mut decoder, 145, 210, 410, 10), 0);
        assert_eq!(decoder.state(), DebounceState::Confirmed(Button::One));

        assert_eq!(feed(&mut decoder, 1_023, 420, 500, 10), 0);
        assert_eq!(feed(&mut decoder, 145, 510, 700, 10), 1);
        assert_eq!(decoder.state(), DebounceState::Confirmed(Button::Two));
    }

    #[test]
    fn debounce_survives_counter_rollover() {
        let mut decoder = decoder();
        let start = Millis::from_raw(u32::MAX - 10);
        assert_eq!(decoder.update(0, start), None);
        assert_eq!(decoder.update(0, start.wrapping_add(60)), Some(Button::One));
    }
}
