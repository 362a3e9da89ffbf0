#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use clock_core::config::ClockConfig;
use clock_core::controller::{ClockController, TickInput, TickReport};
use clock_core::display::{BrightnessLevel, DisplayText};
use clock_core::peripherals::{
    DisplayPeripheral, RadioTimeSource, StartupPacer, WallClockPeripheral,
};
use clock_core::power::MotionCell;
use clock_core::time::{CivilDateTime, Millis, Timestamp};
use clock_core::timezone::FixedOffset;

pub const T0: u64 = 1_700_000_000;
pub const TICK_MS: u32 = 20;
/// Keypad reading with no button pressed.
pub const KEYPAD_IDLE: u16 = 1_023;
pub const KEYPAD_BUTTON_ONE: u16 = 0;
pub const LIGHT_DIM_ROOM: u16 = 40;

/// Renders a UTC timestamp the way the display shows it.
pub fn hhmm(secs: u64) -> String {
    let civil = CivilDateTime::from_timestamp(Timestamp::from_secs(secs));
    format!("{:02}:{:02}", civil.hour, civil.minute)
}

/// Shared monotonic clock driving both the controller and the mocks.
#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u32>>);

impl SimClock {
    pub fn now(&self) -> Millis {
        Millis::from_raw(self.0.get())
    }

    pub fn set(&self, raw: u32) {
        self.0.set(raw);
    }

    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }
}

#[derive(Default)]
pub struct MockRadio {
    pub pending: Option<Timestamp>,
    pub valid: bool,
    pub bits: u8,
    pub last_bit: u8,
    pub running: bool,
    pub starts: u32,
    pub stops: u32,
    pub polls: u32,
}

impl MockRadio {
    pub fn deliver(&mut self, secs: u64, valid: bool) {
        self.pending = Some(Timestamp::from_secs(secs));
        self.valid = valid;
    }
}

impl RadioTimeSource for MockRadio {
    fn start(&mut self) {
        self.running = true;
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops += 1;
    }

    fn current_utc_time(&mut self) -> Option<Timestamp> {
        self.polls += 1;
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

/// Backup clock that keeps time from the shared [`SimClock`].
pub struct MockBackup {
    clock: SimClock,
    base: u64,
    base_at: Millis,
    pub present: bool,
    pub running: bool,
    pub reads: u32,
    pub writes: Vec<u64>,
}

impl MockBackup {
    pub fn running_at(clock: &SimClock, secs: u64) -> Self {
        Self {
            clock: clock.clone(),
            base: secs,
            base_at: clock.now(),
            present: true,
            running: true,
            reads: 0,
            writes: Vec::new(),
        }
    }

    pub fn absent(clock: &SimClock) -> Self {
        Self {
            present: false,
            running: false,
            ..Self::running_at(clock, 0)
        }
    }

    pub fn stopped(clock: &SimClock) -> Self {
        Self {
            running: false,
            ..Self::running_at(clock, 0)
        }
    }

    pub fn time(&self) -> u64 {
        if !self.running {
            return self.base;
        }
        self.base + u64::from(self.clock.now().wrapping_since(self.base_at) / 1_000)
    }

    pub fn set_time(&mut self, secs: u64) {
        self.base = secs;
        self.base_at = self.clock.now();
    }
}

impl WallClockPeripheral for MockBackup {
    fn is_present_and_running(&mut self) -> bool {
        self.present && self.running
    }

    fn read(&mut self) -> Timestamp {
        self.reads += 1;
        if self.present {
            Timestamp::from_secs(self.time())
        } else {
            Timestamp::UNSET
        }
    }

    fn write(&mut self, time: Timestamp) {
        self.writes.push(time.as_secs());
        if self.present {
            self.set_time(time.as_secs());
            self.running = true;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayCall {
    Brightness(u8),
    Blink(bool),
    Alarm(bool),
    Digits(String),
    Clear,
    PowerOff,
}

#[derive(Default)]
pub struct MockDisplay {
    pub calls: Vec<DisplayCall>,
    pub powered: bool,
}

impl MockDisplay {
    pub fn last_digits(&self) -> Option<&str> {
        self.calls.iter().rev().find_map(|call| match call {
            DisplayCall::Digits(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn last_alarm(&self) -> Option<bool> {
        self.calls.iter().rev().find_map(|call| match call {
            DisplayCall::Alarm(on) => Some(*on),
            _ => None,
        })
    }

    pub fn count(&self, matches: impl Fn(&DisplayCall) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn writes(&self) -> usize {
        self.count(|call| {
            matches!(
                call,
                DisplayCall::Digits(_) | DisplayCall::Brightness(_) | DisplayCall::Blink(_)
            )
        })
    }
}

impl DisplayPeripheral for MockDisplay {
    fn set_brightness(&mut self, level: BrightnessLevel) {
        self.powered = true;
        self.calls.push(DisplayCall::Brightness(level.value()));
    }

    fn set_blink_indicator(&mut self, on: bool) {
        self.calls.push(DisplayCall::Blink(on));
    }

    fn set_alarm_indicator(&mut self, on: bool) {
        self.calls.push(DisplayCall::Alarm(on));
    }

    fn write_digits(&mut self, text: &DisplayText) {
        self.calls.push(DisplayCall::Digits(text.to_string()));
    }

    fn clear(&mut self) {
        self.calls.push(DisplayCall::Clear);
    }

    fn power_off(&mut self) {
        self.powered = false;
        self.calls.push(DisplayCall::PowerOff);
    }
}

pub struct Pacer {
    pub clock: SimClock,
    pub step_ms: u32,
    pub pauses: u32,
}

impl StartupPacer for Pacer {
    fn now(&mut self) -> Millis {
        self.clock.now()
    }

    fn pause(&mut self) {
        self.pauses += 1;
        self.clock.advance(self.step_ms);
    }
}

pub type TestController = ClockController<MockRadio, MockBackup, MockDisplay, FixedOffset>;

/// Controller wired to mocks plus the inputs the runtime would sample.
pub struct Rig {
    pub clock: SimClock,
    pub motion: MotionCell,
    pub controller: TestController,
    pub light: u16,
    pub keypad: u16,
    pub motion_asserted: bool,
}

impl Rig {
    pub fn new(config: ClockConfig, backup: impl FnOnce(&SimClock) -> MockBackup) -> Self {
        Self::new_at(config, 0, backup)
    }

    /// Like [`Rig::new`], with the monotonic counter starting at `start_ms`.
    pub fn new_at(
        config: ClockConfig,
        start_ms: u32,
        backup: impl FnOnce(&SimClock) -> MockBackup,
    ) -> Self {
        let clock = SimClock::default();
        clock.set(start_ms);
        let backup = backup(&clock);
        let controller = ClockController::new(
            config,
            MockRadio::default(),
            backup,
            MockDisplay::default(),
            FixedOffset::UTC,
        )
        .expect("valid config");

        Self {
            clock,
            motion: MotionCell::new(),
            controller,
            light: LIGHT_DIM_ROOM,
            keypad: KEYPAD_IDLE,
            motion_asserted: false,
        }
    }

    /// Rig whose backup clock is running at [`T0`] and has completed startup.
    pub fn started(config: ClockConfig) -> Self {
        let mut rig = Self::new(config, |clock| MockBackup::running_at(clock, T0));
        rig.startup(250);
        rig
    }

    pub fn startup(&mut self, step_ms: u32) -> clock_core::controller::StartupOutcome {
        let mut pacer = Pacer {
            clock: self.clock.clone(),
            step_ms,
            pauses: 0,
        };
        self.controller.startup(&mut pacer)
    }

    pub fn input(&self) -> TickInput {
        TickInput {
            now: self.clock.now(),
            light_sample: self.light,
            keypad_sample: self.keypad,
            motion: self.motion.snapshot(),
            motion_asserted: self.motion_asserted,
        }
    }

    /// Advances the clock by one tick period and runs one tick.
    pub fn tick(&mut self) -> TickReport {
        self.clock.advance(TICK_MS);
        let input = self.input();
        self.controller.tick(input)
    }

    pub fn ticks(&mut self, count: u32) -> TickReport {
        let mut report = self.tick();
        for _ in 1..count {
            report = self.tick();
        }
        report
    }

    /// Runs ticks until `ms` have elapsed.
    pub fn run_for(&mut self, ms: u32) -> TickReport {
        self.ticks(ms.div_ceil(TICK_MS).max(1))
    }

    /// Presses and releases button one long enough to confirm it.
    pub fn press_toggle(&mut self) -> TickReport {
        self.keypad = KEYPAD_BUTTON_ONE;
        let mut pressed = None;
        for _ in 0..5 {
            let report = self.tick();
            if report.button.is_some() {
                pressed = Some(report);
            }
        }
        self.keypad = KEYPAD_IDLE;
        self.tick();
        pressed.expect("press confirmed")
    }

    pub fn radio(&mut self) -> &mut MockRadio {
        self.controller.radio_mut()
    }

    pub fn backup(&mut self) -> &mut MockBackup {
        self.controller.backup_mut()
    }

    pub fn display(&self) -> &MockDisplay {
        self.controller.display()
    }

    pub fn clear_display_log(&mut self) {
        self.controller.display_mut().calls.clear();
    }
}
