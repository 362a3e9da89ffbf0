//! Radio receiver state shared between the pulse task and the clock loop.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::sync::atomic::Ordering;

use clock_core::peripherals::RadioTimeSource;
use clock_core::time::Timestamp;
use embedded_hal::digital::OutputPin;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU64};

use crate::dcf77::{DecodedFrame, Dcf77Decoder, FrameError, PulseOutcome};

/// Latest decoder results, written from the pulse task.
pub struct RadioState {
    pending_utc: AtomicU64,
    frame_valid: AtomicBool,
    bits_received: AtomicU8,
    last_bit: AtomicU8,
    running: AtomicBool,
    /// Bumped on every start so the pulse task drops frames begun before a stop.
    generation: AtomicU8,
}

impl RadioState {
    pub const fn new() -> Self {
        Self {
            pending_utc: AtomicU64::new(0),
            frame_valid: AtomicBool::new(false),
            bits_received: AtomicU8::new(0),
            last_bit: AtomicU8::new(0),
            running: AtomicBool::new(false),
            generation: AtomicU8::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Forgets all partial-frame progress before the receiver runs again.
    fn restart(&self) {
        self.pending_utc.store(0, Ordering::Relaxed);
        self.bits_received.store(0, Ordering::Relaxed);
        self.last_bit.store(0, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.set_running(true);
    }

    fn generation(&self) -> u8 {
        self.generation.load(Ordering::Acquire)
    }

    /// Publishes the outcome of a completed frame.
    ///
    /// Rejected frames clear the validity flag but deliver no time; the
    /// arbiter only ever sees timestamps from frames that decoded.
    pub fn publish_frame(&self, outcome: Result<DecodedFrame, FrameError>) {
        match outcome {
            Ok(frame) => {
                self.frame_valid.store(true, Ordering::Relaxed);
                self.pending_utc
                    .store(frame.utc.as_secs(), Ordering::Release);
            }
            Err(_) => self.frame_valid.store(false, Ordering::Release),
        }
        self.bits_received.store(0, Ordering::Relaxed);
    }

    pub fn publish_pulse(&self, outcome: PulseOutcome, bits_received: u8) {
        if let PulseOutcome::Bit(bit) = outcome {
            self.last_bit.store(bit, Ordering::Relaxed);
        }
        self.bits_received.store(bits_received, Ordering::Relaxed);
    }

    fn take_pending(&self) -> Option<Timestamp> {
        Timestamp::from_secs(self.pending_utc.swap(0, Ordering::AcqRel)).non_zero()
    }
}

impl Default for RadioState {
    fn default() -> Self {
        Self::new()
    }
}

/// Feeds receiver edges through a decoder into the shared state.
pub struct PulseFeed<'a> {
    state: &'a RadioState,
    decoder: Dcf77Decoder,
    generation: u8,
}

impl<'a> PulseFeed<'a> {
    pub const fn new(state: &'a RadioState) -> Self {
        Self {
            state,
            decoder: Dcf77Decoder::new(),
            generation: 0,
        }
    }

    /// Resets the decoder when the receiver was restarted since the last edge.
    fn sync_generation(&mut self) {
        let generation = self.state.generation();
        if generation != self.generation {
            self.generation = generation;
            self.decoder.reset();
        }
    }

    /// Returns the frame outcome when this edge closed a minute.
    pub fn rising(&mut self, at_ms: u32) -> Option<Result<DecodedFrame, FrameError>> {
        if !self.state.is_running() {
            self.decoder.reset();
            return None;
        }
        self.sync_generation();
        let outcome = self.decoder.on_pulse_start(at_ms);
        if let Some(result) = outcome {
            self.state.publish_frame(result);
        }
        outcome
    }

    pub fn falling(&mut self, at_ms: u32) -> PulseOutcome {
        if !self.state.is_running() {
            return PulseOutcome::Glitch;
        }
        self.sync_generation();
        let outcome = self.decoder.on_pulse_end(at_ms);
        self.state
            .publish_pulse(outcome, self.decoder.bits_received());
        outcome
    }
}

/// DCF77 receiver behind a power-down pin.
///
/// The receiver module runs while its enable line is low.
pub struct Dcf77Radio<'a, P> {
    state: &'a RadioState,
    power_down: P,
}

impl<'a, P: OutputPin> Dcf77Radio<'a, P> {
    pub fn new(state: &'a RadioState, power_down: P) -> Self {
        Self { state, power_down }
    }
}

impl<P: OutputPin> RadioTimeSource for Dcf77Radio<'_, P> {
    fn start(&mut self) {
        // Pin errors are infallible on every supported HAL.
        let _ = self.power_down.set_low();
        self.state.restart();
    }

    fn stop(&mut self) {
        self.state.set_running(false);
        let _ = self.power_down.set_high();
    }

    fn current_utc_time(&mut self) -> Option<Timestamp> {
        self.state.take_pending()
    }

    fn is_frame_valid(&self) -> bool {
        self.state.frame_valid.load(Ordering::Acquire)
    }

    fn bits_received(&self) -> u8 {
        self.state.bits_received.load(Ordering::Relaxed)
    }

    fn last_bit(&self) -> u8 {
        self.state.last_bit.load(Ordering::Relaxed)
    }
}
