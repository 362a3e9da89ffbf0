//! Host stand-ins for the clock's peripherals.
//!
//! Everything runs on a virtual millisecond counter shared through
//! [`SimClock`], so a session is deterministic regardless of host load.

use std::cell::Cell;
use std::rc::Rc;

use clock_core::display::{BrightnessLevel, DisplayText};
use clock_core::peripherals::{
    DisplayPeripheral, RadioTimeSource, StartupPacer, TimezoneConverter, WallClockPeripheral,
};
use clock_core::time::{Millis, Timestamp};
use clock_core::timezone::{FixedOffset, Timezone};
use crossterm::style::Stylize;

/// Virtual monotonic counter shared by the session and its peripherals.
#[derive(Clone, Debug, Default)]
pub struct SimClock(Rc<Cell<u32>>);

impl SimClock {
    pub fn starting_at(ms: u32) -> Self {
        Self(Rc::new(Cell::new(ms)))
    }

    pub fn now(&self) -> Millis {
        Millis::from_raw(self.0.get())
    }

    pub fn advance(&self, ms: u32) -> Millis {
        self.0.set(self.0.get().wrapping_add(ms));
        self.now()
    }
}

/// Radio receiver fed by `radio` commands.
#[derive(Debug, Default)]
pub struct SimRadio {
    pending: Option<Timestamp>,
    valid: bool,
    bits: u8,
    last_bit: u8,
    running: bool,
}

impl SimRadio {
    /// Queues a decoded frame for the next poll.
    pub fn deliver(&mut self, utc: Timestamp, valid: bool) {
        if self.running {
            self.pending = Some(utc);
            self.valid = valid;
            self.bits = 0;
        }
    }

    pub fn set_progress(&mut self, bits: u8, last_bit: u8) {
        self.bits = bits;
        self.last_bit = last_bit;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl RadioTimeSource for SimRadio {
    fn start(&mut self) {
        self.running = true;
        self.bits = 0;
        self.last_bit = 0;
    }

    fn stop(&mut self) {
        self.running = false;
        self.pending = None;
    }

    fn current_utc_time(&mut self) -> Option<Timestamp> {
        self.pending.take()
    }

    fn is_frame_valid(&self) -> bool {
        self.valid
    }

    fn bits_received(&self) -> u8 {
        self.bits
    }

    fn last_bit(&self) -> u8 {
        self.last_bit
    }
}

/// Battery-backed clock that keeps counting on the virtual timeline.
#[derive(Debug)]
pub struct SimBackupClock {
    clock: SimClock,
    base: Timestamp,
    set_at: Millis,
    present: bool,
    running: bool,
    writes: usize,
}

impl SimBackupClock {
    pub fn running_at(clock: SimClock, utc: Timestamp) -> Self {
        let set_at = clock.now();
        Self {
            clock,
            base: utc,
            set_at,
            present: true,
            running: true,
            writes: 0,
        }
    }

    pub fn stopped(clock: SimClock) -> Self {
        Self {
            running: false,
            ..Self::running_at(clock, Timestamp::UNSET)
        }
    }

    pub fn absent(clock: SimClock) -> Self {
        Self {
            present: false,
            ..Self::stopped(clock)
        }
    }

    pub fn time(&self) -> Timestamp {
        if !self.running {
            return self.base;
        }
        let elapsed = self.clock.now().wrapping_since(self.set_at) / 1_000;
        self.base.saturating_add_secs(u64::from(elapsed))
    }

    pub fn set_time(&mut self, utc: Timestamp) {
        self.base = utc;
        self.set_at = self.clock.now();
        self.present = true;
        self.running = true;
    }

    /// Halts the oscillator, freezing the stored time.
    pub fn halt(&mut self) {
        self.base = self.time();
        self.running = false;
    }

    pub fn remove(&mut self) {
        self.present = false;
        self.running = false;
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl WallClockPeripheral for SimBackupClock {
    fn is_present_and_running(&mut self) -> bool {
        self.present && self.running
    }

    fn read(&mut self) -> Timestamp {
        if self.present {
            self.time()
        } else {
            Timestamp::UNSET
        }
    }

    fn write(&mut self, time: Timestamp) {
        if self.present {
            self.writes += 1;
            self.set_time(time);
        }
    }
}

/// Display state rendered as a one-line face.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TerminalDisplay {
    text: Option<DisplayText>,
    colon: bool,
    alarm: bool,
    brightness: Option<BrightnessLevel>,
    powered: bool,
    /// Set whenever the face changes; cleared by [`TerminalDisplay::take_dirty`].
    dirty: bool,
}

impl TerminalDisplay {
    pub fn text(&self) -> Option<DisplayText> {
        self.text
    }

    pub fn alarm(&self) -> bool {
        self.alarm
    }

    pub fn colon(&self) -> bool {
        self.colon
    }

    pub fn brightness(&self) -> Option<BrightnessLevel> {
        self.brightness
    }

    pub fn is_lit(&self) -> bool {
        self.powered && self.text.is_some()
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Renders the face. The colon blinks, so it is omitted from plain output
    /// to keep transcripts stable.
    pub fn render(&self, styled: bool) -> String {
        let Some(text) = self.text.filter(|_| self.powered) else {
            return "display [  :  ] dark".to_string();
        };
        let face = text.to_string();
        let alarm = if self.alarm { " ALARM" } else { "" };
        let level = self.brightness.map_or(0, BrightnessLevel::value);

        if !styled {
            return format!("display [{face}] level={level}{alarm}");
        }
        let face = if self.colon {
            face.bold().green()
        } else {
            face.replace(':', " ").bold().green()
        };
        let alarm = if self.alarm { alarm.red().to_string() } else { String::new() };
        format!("display [{face}] level={level}{alarm}")
    }

    fn touch(&mut self) {
        self.dirty = true;
    }
}

impl DisplayPeripheral for TerminalDisplay {
    fn set_brightness(&mut self, level: BrightnessLevel) {
        self.brightness = Some(level);
        self.powered = true;
        self.touch();
    }

    fn set_blink_indicator(&mut self, on: bool) {
        self.colon = on;
    }

    fn set_alarm_indicator(&mut self, on: bool) {
        if self.alarm != on {
            self.alarm = on;
            self.touch();
        }
    }

    fn write_digits(&mut self, text: &DisplayText) {
        self.text = Some(*text);
        self.touch();
    }

    fn clear(&mut self) {
        self.text = None;
        self.alarm = false;
        self.colon = false;
        self.touch();
    }

    fn power_off(&mut self) {
        self.powered = false;
        self.touch();
    }
}

/// Zone selected on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostZone {
    CentralEuropean(Timezone),
    Fixed(FixedOffset),
}

impl HostZone {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("cet") {
            Ok(Self::CentralEuropean(Timezone::central_european()))
        } else if tag.eq_ignore_ascii_case("utc") {
            Ok(Self::Fixed(FixedOffset::UTC))
        } else {
            Err(format!("Unknown zone `{tag}` (expected cet or utc)"))
        }
    }

    pub fn label(&self, utc: Timestamp) -> &'static str {
        match self {
            HostZone::CentralEuropean(zone) => zone.rule_at(utc).abbrev,
            HostZone::Fixed(_) => "UTC",
        }
    }
}

impl TimezoneConverter for HostZone {
    fn to_local(&self, utc: Timestamp) -> Timestamp {
        match self {
            HostZone::CentralEuropean(zone) => zone.to_local(utc),
            HostZone::Fixed(offset) => offset.to_local(utc),
        }
    }
}

/// Startup pacing on the virtual timeline.
pub struct SimPacer {
    clock: SimClock,
    pause_ms: u32,
}

impl SimPacer {
    pub fn new(clock: SimClock, pause_ms: u32) -> Self {
        Self { clock, pause_ms }
    }
}

impl StartupPacer for SimPacer {
    fn now(&mut self) -> Millis {
        self.clock.now()
    }

    fn pause(&mut self) {
        self.clock.advance(self.pause_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_clock_counts_on_virtual_time() {
        let clock = SimClock::starting_at(0);
        let mut backup = SimBackupClock::running_at(clock.clone(), Timestamp::from_secs(100));
        clock.advance(2_500);
        assert_eq!(backup.read(), Timestamp::from_secs(102));

        backup.halt();
        clock.advance(10_000);
        assert_eq!(backup.read(), Timestamp::from_secs(102));
        assert!(!backup.is_present_and_running());

        backup.write(Timestamp::from_secs(500));
        assert!(backup.is_present_and_running());
        assert_eq!(backup.writes(), 1);
    }

    #[test]
    fn absent_backup_ignores_writes() {
        let clock = SimClock::starting_at(0);
        let mut backup = SimBackupClock::absent(clock);
        backup.write(Timestamp::from_secs(500));
        assert_eq!(backup.read(), Timestamp::UNSET);
        assert_eq!(backup.writes(), 0);
    }

    #[test]
    fn stopped_radio_drops_deliveries() {
        let mut radio = SimRadio::default();
        radio.deliver(Timestamp::from_secs(5), true);
        assert_eq!(radio.current_utc_time(), None);

        radio.start();
        radio.deliver(Timestamp::from_secs(5), true);
        assert_eq!(radio.current_utc_time(), Some(Timestamp::from_secs(5)));
        assert!(radio.is_frame_valid());
    }

    #[test]
    fn plain_render_reports_face_and_alarm() {
        let mut display = TerminalDisplay::default();
        assert_eq!(display.render(false), "display [  :  ] dark");

        display.set_brightness(BrightnessLevel::new(9));
        display.write_digits(&DisplayText::clock(7, 5));
        display.set_alarm_indicator(true);
        assert_eq!(display.render(false), "display [07:05] level=9 ALARM");

        display.power_off();
        assert_eq!(display.render(false), "display [  :  ] dark");
    }
}
