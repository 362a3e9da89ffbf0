//! Display buffer and brightness level types.

use core::fmt;

/// Number of digit positions on the display.
pub const DIGIT_COUNT: usize = 4;
/// Length of the rendered `HH:MM` layout.
pub const LAYOUT_LEN: usize = DIGIT_COUNT + 1;
/// Position of the literal colon within the layout.
pub const COLON_INDEX: usize = 2;

/// Four glyphs shown on the display, left to right.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DisplayText {
    glyphs: [u8; DIGIT_COUNT],
}

impl DisplayText {
    /// All positions dark.
    pub const BLANK: Self = Self {
        glyphs: [b' '; DIGIT_COUNT],
    };

    /// Shown while no time has ever been adopted.
    pub const UNSET: Self = Self {
        glyphs: [b'-'; DIGIT_COUNT],
    };

    #[must_use]
    pub const fn from_glyphs(glyphs: [u8; DIGIT_COUNT]) -> Self {
        Self { glyphs }
    }

    /// Two zero-padded two-digit fields; values wrap modulo 100.
    #[must_use]
    pub const fn from_pairs(left: u8, right: u8) -> Self {
        let left = left % 100;
        let right = right % 100;
        Self {
            glyphs: [
                b'0' + left / 10,
                b'0' + left % 10,
                b'0' + right / 10,
                b'0' + right % 10,
            ],
        }
    }

    /// Clock face for the given local hour and minute.
    #[must_use]
    pub const fn clock(hour: u8, minute: u8) -> Self {
        Self::from_pairs(hour, minute)
    }

    /// Sync diagnostic: last received bit on the left, bit count on the right.
    #[must_use]
    pub const fn sync_progress(last_bit: u8, bits_received: u8) -> Self {
        Self::from_pairs(if last_bit == 0 { 0 } else { 1 }, bits_received)
    }

    #[must_use]
    pub const fn glyphs(&self) -> &[u8; DIGIT_COUNT] {
        &self.glyphs
    }

    /// Renders the wire layout `H H : M M`.
    #[must_use]
    pub const fn layout(&self) -> [u8; LAYOUT_LEN] {
        let [a, b, c, d] = self.glyphs;
        [a, b, b':', c, d]
    }
}

impl fmt::Display for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.layout() {
            write!(f, "{}", char::from(byte))?;
        }
        Ok(())
    }
}

/// Quantized display brightness, `0..=max_level`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BrightnessLevel(u8);

impl BrightnessLevel {
    #[must_use]
    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for BrightnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
