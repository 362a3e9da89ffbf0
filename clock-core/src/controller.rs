//! Top-level control loop.
//!
//! [`ClockController`] owns every piece of mutable state and the four
//! collaborators. The runtime calls [`ClockController::startup`] once, then
//! [`ClockController::tick`] on every scheduler period. Each tick runs the
//! keypad decoder and brightness controller unconditionally, polls the radio,
//! dispatches on [`ClockMode`], and finally lets the power machine decide
//! whether the display stays lit or the processor suspends.

use crate::arbiter::{BackupState, RadioPoll, Reconciliation, TimeArbiter};
use crate::brightness::BrightnessController;
use crate::config::{ClockConfig, ConfigError};
use crate::display::{BrightnessLevel, DisplayText};
use crate::keypad::{Button, DebounceState, InputDecoder};
use crate::mode::ClockMode;
use crate::peripherals::{
    DisplayPeripheral, RadioTimeSource, StartupPacer, TimezoneConverter, WallClockPeripheral,
};
use crate::power::{MotionSnapshot, PowerMode, PowerStateMachine};
use crate::telemetry::{
    RadioTelemetry, StartupTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder,
};
use crate::time::{CivilDateTime, Millis, TimeStatus, Timestamp};

/// Samples gathered by the runtime for one tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickInput {
    pub now: Millis,
    pub light_sample: u16,
    pub keypad_sample: u16,
    pub motion: MotionSnapshot,
    /// Level of the motion line at sampling time.
    pub motion_asserted: bool,
}

/// What happened during one tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickReport {
    pub button: Option<Button>,
    pub mode: ClockMode,
    pub power: PowerMode,
    /// New digits were written to the display.
    pub redrawn: bool,
    /// The caller must suspend until the next motion edge, then call
    /// [`ClockController::resume`].
    pub suspend: bool,
}

/// How the adopted time was first obtained.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StartupOutcome {
    FromBackup,
    FromRadio { backup_running: bool },
    /// The radio never delivered a fix within the attempt budget.
    Unsynced,
}

/// Remembers what the display shows so unchanged content is not rewritten.
#[derive(Copy, Clone, Debug, Default)]
struct RedrawGate {
    minute: Option<u64>,
    second: Option<u64>,
    colon: bool,
    alarm: Option<bool>,
    text: Option<DisplayText>,
}

impl RedrawGate {
    fn invalidate(&mut self) {
        *self = Self::default();
    }

    fn show<D: DisplayPeripheral>(&mut self, display: &mut D, text: DisplayText) -> bool {
        if self.text == Some(text) {
            return false;
        }
        self.text = Some(text);
        display.write_digits(&text);
        true
    }

    fn set_alarm<D: DisplayPeripheral>(&mut self, display: &mut D, on: bool) {
        if self.alarm != Some(on) {
            self.alarm = Some(on);
            display.set_alarm_indicator(on);
        }
    }

    fn blink<D: DisplayPeripheral>(&mut self, display: &mut D, second: u64) {
        if self.second != Some(second) {
            self.second = Some(second);
            self.colon = !self.colon;
            display.set_blink_indicator(self.colon);
        }
    }

    fn minute_changed(&mut self, minute: u64) -> bool {
        if self.minute == Some(minute) {
            return false;
        }
        self.minute = Some(minute);
        true
    }
}

/// The clock's control core.
pub struct ClockController<R, W, D, Z>
where
    R: RadioTimeSource,
    W: WallClockPeripheral,
    D: DisplayPeripheral,
    Z: TimezoneConverter,
{
    config: ClockConfig,
    radio: R,
    backup: W,
    display: D,
    zone: Z,
    arbiter: TimeArbiter,
    keypad: InputDecoder,
    brightness: BrightnessController,
    power: PowerStateMachine,
    mode: ClockMode,
    gate: RedrawGate,
    telemetry: TelemetryRecorder<Millis>,
}

impl<R, W, D, Z> ClockController<R, W, D, Z>
where
    R: RadioTimeSource,
    W: WallClockPeripheral,
    D: DisplayPeripheral,
    Z: TimezoneConverter,
{
    pub fn new(
        config: ClockConfig,
        radio: R,
        backup: W,
        display: D,
        zone: Z,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            radio,
            backup,
            display,
            zone,
            arbiter: TimeArbiter::new(config.sync),
            keypad: InputDecoder::new(config.keypad),
            brightness: BrightnessController::new(config.brightness),
            power: PowerStateMachine::new(config.power, Millis::ZERO),
            mode: ClockMode::Normal,
            gate: RedrawGate::default(),
            telemetry: TelemetryRecorder::new(),
        })
    }

    /// Acquires an initial time, preferring the backup clock and falling back
    /// to a bounded wait for the radio.
    pub fn startup<P: StartupPacer>(&mut self, pacer: &mut P) -> StartupOutcome {
        let now = pacer.now();
        self.radio.start();
        self.display.clear();
        self.display.set_brightness(self.brightness.level());
        self.power.note_activity(now);
        self.gate.invalidate();

        if self.backup.is_present_and_running() && self.arbiter.seed(self.backup.read(), now) {
            self.arbiter.set_backup_state(BackupState::Available);
            return StartupOutcome::FromBackup;
        }
        self.telemetry
            .record(TelemetryEventKind::BackupMissing, TelemetryPayload::none(), now);

        let attempts = self.config.sync.startup_attempts;
        for _ in 0..attempts {
            let now = pacer.now();
            let poll = self.arbiter.poll_radio(&mut self.radio, now);
            self.record_radio(poll, now);
            if poll.fresh {
                let backup_running = self.push_to_backup(now);
                self.gate.invalidate();
                return StartupOutcome::FromRadio { backup_running };
            }
            self.show_sync_progress();
            pacer.pause();
        }

        self.telemetry.record(
            TelemetryEventKind::StartupTimedOut,
            TelemetryPayload::Startup(StartupTelemetry { attempts }),
            pacer.now(),
        );
        self.gate.invalidate();
        StartupOutcome::Unsynced
    }

    /// Runs one scheduler iteration.
    pub fn tick(&mut self, input: TickInput) -> TickReport {
        let now = input.now;
        if self.power.mode() == PowerMode::DeepSleep {
            if !self.power.is_new_motion(input.motion) && !input.motion_asserted {
                return self.report(None, false, true);
            }
            self.resume(now);
        }

        let button = self.keypad.update(input.keypad_sample, now);
        if let Some(button) = button {
            self.telemetry.record(
                TelemetryEventKind::ButtonPressed(button),
                TelemetryPayload::none(),
                now,
            );
            if let Some(next) = self.power.note_activity(now) {
                self.telemetry
                    .record_power_change(PowerMode::DisplayOff, next, now);
                self.wake_display(now);
            }
            let transition = self.mode.on_button(button, self.config.toggle_button);
            self.change_mode(transition.next, now);
        }

        if let Some(level) = self.brightness.update(input.light_sample)
            && self.power.mode().display_enabled()
        {
            self.display.set_brightness(level);
        }

        let poll = self.arbiter.poll_radio(&mut self.radio, now);
        self.record_radio(poll, now);
        let transition = self.mode.on_radio(poll);
        self.change_mode(transition.next, now);
        if transition.force_write_through && self.arbiter.write_through(&mut self.backup, now) {
            self.telemetry
                .record(TelemetryEventKind::ForcedResync, TelemetryPayload::none(), now);
        }

        let (redrawn, suspend) = match self.mode {
            ClockMode::SyncDisplay => (self.show_sync_progress(), false),
            ClockMode::Normal => {
                self.reconcile(now);
                let redrawn = self.refresh_clock(now);
                let (woke, suspend) = self.evaluate_power(input, now);
                (redrawn || woke, suspend)
            }
        };

        self.report(button, redrawn, suspend)
    }

    /// Wake path out of deep sleep: restarts the radio, re-seeds the adopted
    /// time from the backup clock and lights the display again.
    pub fn resume(&mut self, now: Millis) {
        if self.power.mode() != PowerMode::DeepSleep {
            return;
        }
        self.radio.start();
        self.arbiter.reseed_from_backup(&mut self.backup, now);
        if let Some(next) = self.power.resume(now) {
            self.telemetry
                .record_power_change(PowerMode::DeepSleep, next, now);
        }
        self.wake_display(now);
    }

    #[must_use]
    pub const fn config(&self) -> &ClockConfig {
        &self.config
    }

    #[must_use]
    pub const fn mode(&self) -> ClockMode {
        self.mode
    }

    #[must_use]
    pub const fn power_mode(&self) -> PowerMode {
        self.power.mode()
    }

    #[must_use]
    pub const fn time_status(&self) -> TimeStatus {
        self.arbiter.status()
    }

    /// Frame validity reported by the most recent radio poll.
    #[must_use]
    pub const fn sync_quality(&self) -> bool {
        self.arbiter.quality()
    }

    #[must_use]
    pub fn adopted_time(&self, now: Millis) -> Timestamp {
        self.arbiter.adopted(now)
    }

    /// Local wall time at `now`, if any time has been adopted.
    #[must_use]
    pub fn local_time(&self, now: Millis) -> Option<CivilDateTime> {
        self.arbiter
            .adopted(now)
            .non_zero()
            .map(|utc| CivilDateTime::from_timestamp(self.zone.to_local(utc)))
    }

    #[must_use]
    pub const fn brightness(&self) -> BrightnessLevel {
        self.brightness.level()
    }

    #[must_use]
    pub const fn keypad_state(&self) -> DebounceState {
        self.keypad.state()
    }

    #[must_use]
    pub const fn backup_state(&self) -> BackupState {
        self.arbiter.backup_state()
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<Millis> {
        &self.telemetry
    }

    #[must_use]
    pub const fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    #[must_use]
    pub const fn backup(&self) -> &W {
        &self.backup
    }

    pub fn backup_mut(&mut self) -> &mut W {
        &mut self.backup
    }

    #[must_use]
    pub const fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    fn report(&self, button: Option<Button>, redrawn: bool, suspend: bool) -> TickReport {
        TickReport {
            button,
            mode: self.mode,
            power: self.power.mode(),
            redrawn,
            suspend,
        }
    }

    fn change_mode(&mut self, next: ClockMode, now: Millis) {
        if next == self.mode {
            return;
        }
        if self.mode == ClockMode::SyncDisplay {
            // The idle timeout is held while diagnosing and restarts on return.
            if let Some(woke) = self.power.note_activity(now) {
                self.telemetry
                    .record_power_change(PowerMode::DisplayOff, woke, now);
            }
        }
        self.mode = next;
        self.gate.invalidate();
        self.telemetry.record(
            TelemetryEventKind::ModeChanged(next),
            TelemetryPayload::none(),
            now,
        );
    }

    fn record_radio(&mut self, poll: RadioPoll, now: Millis) {
        if poll.fresh {
            let details = RadioTelemetry::new(poll.valid, self.radio.bits_received());
            self.telemetry.record(
                TelemetryEventKind::RadioSynced,
                TelemetryPayload::Radio(details),
                now,
            );
        }
        if poll.went_stale {
            self.telemetry
                .record(TelemetryEventKind::RadioStale, TelemetryPayload::none(), now);
        }
    }

    /// Writes a fresh trusted fix to the backup clock; reports whether the
    /// backup clock is running afterwards.
    fn push_to_backup(&mut self, now: Millis) -> bool {
        if !self.arbiter.write_through(&mut self.backup, now) {
            return false;
        }
        let running = self.arbiter.backup_state() == BackupState::Available;
        if running {
            self.telemetry
                .record(TelemetryEventKind::BackupStarted, TelemetryPayload::none(), now);
        }
        running
    }

    fn reconcile(&mut self, now: Millis) {
        match self.arbiter.reconcile(&mut self.backup, now) {
            Reconciliation::CorrectedBackup { delta } => {
                self.telemetry
                    .record_correction(TelemetryEventKind::BackupCorrected, delta, now);
            }
            // Single-second disagreements are phase jitter between the two oscillators.
            Reconciliation::AdoptedBackup { delta } if delta.unsigned_abs() > 1 => {
                self.telemetry
                    .record_correction(TelemetryEventKind::AdoptedFromBackup, delta, now);
            }
            Reconciliation::StartedBackup => {
                self.telemetry
                    .record(TelemetryEventKind::BackupStarted, TelemetryPayload::none(), now);
            }
            Reconciliation::AdoptedBackup { .. }
            | Reconciliation::InAgreement
            | Reconciliation::Skipped => {}
        }
    }

    fn refresh_clock(&mut self, now: Millis) -> bool {
        if !self.power.mode().display_enabled() {
            return false;
        }

        let synced = self.arbiter.status() == TimeStatus::Synced;
        self.gate.set_alarm(&mut self.display, !synced);

        let adopted = self.arbiter.adopted(now);
        if adopted.is_unset() {
            return self.gate.show(&mut self.display, DisplayText::UNSET);
        }

        self.gate.blink(&mut self.display, adopted.as_secs());
        let local = self.zone.to_local(adopted);
        if !self.gate.minute_changed(local.whole_minutes()) {
            return false;
        }
        let civil = CivilDateTime::from_timestamp(local);
        self.gate
            .show(&mut self.display, DisplayText::clock(civil.hour, civil.minute))
    }

    fn show_sync_progress(&mut self) -> bool {
        let text = DisplayText::sync_progress(self.radio.last_bit(), self.radio.bits_received());
        self.gate.set_alarm(&mut self.display, !self.arbiter.quality());
        self.gate.show(&mut self.display, text)
    }

    fn refresh(&mut self, now: Millis) -> bool {
        match self.mode {
            ClockMode::Normal => self.refresh_clock(now),
            ClockMode::SyncDisplay => self.show_sync_progress(),
        }
    }

    fn wake_display(&mut self, now: Millis) -> bool {
        self.display.set_brightness(self.brightness.level());
        self.gate.invalidate();
        self.refresh(now)
    }

    fn evaluate_power(&mut self, input: TickInput, now: Millis) -> (bool, bool) {
        let previous = self.power.mode();
        let Some(next) = self.power.step(now, input.motion, input.motion_asserted) else {
            return (false, false);
        };
        self.telemetry.record_power_change(previous, next, now);

        match next {
            PowerMode::Active => (self.wake_display(now), false),
            PowerMode::DisplayOff => {
                self.display.clear();
                (false, false)
            }
            PowerMode::DeepSleep => {
                self.radio.stop();
                self.display.clear();
                self.display.power_off();
                (false, true)
            }
        }
    }
}
