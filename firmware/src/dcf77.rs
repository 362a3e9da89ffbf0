//! DCF77 time code decoder.
//!
//! The receiver module reports each one-second carrier reduction as a pulse:
//! roughly 100 ms encodes a 0 bit, roughly 200 ms a 1 bit. Second 59 carries
//! no pulse, so a gap of about two seconds between pulse starts marks the
//! minute boundary. The pulse that ends the gap is bit 0 of the next frame;
//! the 59 bits collected before it describe the minute that just began.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt;

use clock_core::time::{CivilDateTime, Timestamp};

/// Bits in a complete frame (seconds 0 through 58).
pub const FRAME_BITS: u8 = 59;

/// Pulses at least this long decode as a 1 bit.
const ONE_BIT_THRESHOLD_MS: u32 = 150;
/// Shorter pulses are noise.
const MIN_PULSE_MS: u32 = 40;
/// Longer pulses are noise.
const MAX_PULSE_MS: u32 = 260;
/// Gap between pulse starts that marks the missing 59th second.
const MINUTE_GAP_MS: u32 = 1_500;

const CEST_BIT: u32 = 17;
const CET_BIT: u32 = 18;
const TIME_START_BIT: u32 = 20;

/// Frame field covered by an even-parity bit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParityField {
    Minute,
    Hour,
    Date,
}

/// Why a completed frame was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameError {
    /// The minute mark arrived after the wrong number of bits.
    BitCount(u8),
    /// Bit 0 (start of minute) was not 0.
    StartBit,
    /// Bit 20 (start of time) was not 1.
    TimeStartBit,
    /// Exactly one of the CET/CEST flags must be set.
    ZoneFlags,
    Parity(ParityField),
    /// A BCD field decoded to an impossible calendar value.
    OutOfRange,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BitCount(count) => write!(f, "frame had {count} bits"),
            FrameError::StartBit => f.write_str("start-of-minute bit set"),
            FrameError::TimeStartBit => f.write_str("start-of-time bit clear"),
            FrameError::ZoneFlags => f.write_str("inconsistent CET/CEST flags"),
            FrameError::Parity(field) => write!(f, "{field:?} parity mismatch"),
            FrameError::OutOfRange => f.write_str("calendar field out of range"),
        }
    }
}

/// A frame that passed every structural check.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DecodedFrame {
    pub utc: Timestamp,
    pub summer_time: bool,
}

/// Bit value produced by a completed pulse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PulseOutcome {
    Bit(u8),
    /// The pulse was too short or too long to be a time code bit.
    Glitch,
}

/// Edge-driven frame assembler.
#[derive(Clone, Debug, Default)]
pub struct Dcf77Decoder {
    bits: u64,
    count: u8,
    last_bit: u8,
    pulse_started_at: Option<u32>,
    previous_start: Option<u32>,
}

impl Dcf77Decoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: 0,
            count: 0,
            last_bit: 0,
            pulse_started_at: None,
            previous_start: None,
        }
    }

    /// Drops any partially received frame.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub const fn bits_received(&self) -> u8 {
        self.count
    }

    #[must_use]
    pub const fn last_bit(&self) -> u8 {
        self.last_bit
    }

    /// Handles the start of a carrier reduction at `at_ms`.
    ///
    /// Returns the outcome of the frame that just finished when this pulse
    /// follows the minute gap.
    pub fn on_pulse_start(&mut self, at_ms: u32) -> Option<Result<DecodedFrame, FrameError>> {
        let gap = self
            .previous_start
            .map(|previous| at_ms.wrapping_sub(previous));
        self.previous_start = Some(at_ms);
        self.pulse_started_at = Some(at_ms);

        if gap.is_none_or(|gap| gap <= MINUTE_GAP_MS) {
            return None;
        }

        let outcome = match self.count {
            0 => None,
            FRAME_BITS => Some(decode_frame(self.bits)),
            other => Some(Err(FrameError::BitCount(other))),
        };
        self.bits = 0;
        self.count = 0;
        outcome
    }

    /// Handles the end of a carrier reduction at `at_ms`.
    pub fn on_pulse_end(&mut self, at_ms: u32) -> PulseOutcome {
        let Some(started) = self.pulse_started_at.take() else {
            return PulseOutcome::Glitch;
        };
        let width = at_ms.wrapping_sub(started);
        if !(MIN_PULSE_MS..=MAX_PULSE_MS).contains(&width) {
            return PulseOutcome::Glitch;
        }

        let bit = u8::from(width >= ONE_BIT_THRESHOLD_MS);
        self.last_bit = bit;
        if self.count < FRAME_BITS {
            self.bits |= u64::from(bit) << self.count;
        }
        // Past 59 the count keeps growing so the frame is rejected at the next gap.
        self.count = self.count.saturating_add(1);
        PulseOutcome::Bit(bit)
    }
}

/// Validates and decodes the 59 bits of one frame.
pub fn decode_frame(bits: u64) -> Result<DecodedFrame, FrameError> {
    if bit(bits, 0) {
        return Err(FrameError::StartBit);
    }
    if !bit(bits, TIME_START_BIT) {
        return Err(FrameError::TimeStartBit);
    }

    let summer_time = bit(bits, CEST_BIT);
    if summer_time == bit(bits, CET_BIT) {
        return Err(FrameError::ZoneFlags);
    }

    if !even_parity(bits, 21, 28) {
        return Err(FrameError::Parity(ParityField::Minute));
    }
    if !even_parity(bits, 29, 35) {
        return Err(FrameError::Parity(ParityField::Hour));
    }
    if !even_parity(bits, 36, 58) {
        return Err(FrameError::Parity(ParityField::Date));
    }

    let minute = bcd(bits, 21, 7);
    let hour = bcd(bits, 29, 6);
    let day = bcd(bits, 36, 6);
    let month = bcd(bits, 45, 5);
    let year = bcd(bits, 50, 8);

    if minute > 59 || hour > 23 || !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return Err(FrameError::OutOfRange);
    }
    if year > 99 {
        return Err(FrameError::OutOfRange);
    }

    let local = CivilDateTime::new(2000 + i32::from(year), month, day, hour, minute, 0);
    let offset_secs: i64 = if summer_time { 7_200 } else { 3_600 };
    Ok(DecodedFrame {
        utc: local.to_timestamp().offset_by(-offset_secs),
        summer_time,
    })
}

fn bit(bits: u64, index: u32) -> bool {
    (bits >> index) & 1 == 1
}

/// Parity over `first..=last`, where `last` is the parity bit itself.
fn even_parity(bits: u64, first: u32, last: u32) -> bool {
    let width = last - first + 1;
    let mask = (1u64 << width) - 1;
    ((bits >> first) & mask).count_ones() % 2 == 0
}

/// BCD field of `width` bits starting at `first`, least significant first.
fn bcd(bits: u64, first: u32, width: u32) -> u8 {
    const WEIGHTS: [u8; 8] = [1, 2, 4, 8, 10, 20, 40, 80];
    (0..width)
        .zip(WEIGHTS)
        .filter(|&(offset, _)| bit(bits, first + offset))
        .map(|(_, weight)| weight)
        .sum()
}
