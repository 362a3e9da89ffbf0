//! Reconciliation between radio time and the backup clock.
//!
//! The arbiter owns the adopted clock and decides, tick by tick, which source
//! is authoritative. Radio time overrides the backup clock only while the
//! radio is synced and its last frame was structurally valid; in every other
//! situation the backup clock wins and is never written.

use crate::config::SyncConfig;
use crate::peripherals::{RadioTimeSource, WallClockPeripheral};
use crate::time::{Millis, TimeStatus, Timestamp, duration_to_millis};

/// Base timestamp advanced by the monotonic counter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdoptedClock {
    base: Timestamp,
    set_at: Millis,
}

impl AdoptedClock {
    #[must_use]
    pub const fn unset() -> Self {
        Self {
            base: Timestamp::UNSET,
            set_at: Millis::ZERO,
        }
    }

    pub fn set(&mut self, time: Timestamp, now: Millis) {
        self.base = time;
        self.set_at = now;
    }

    /// Adopted time at `now`; stays unset until a time is set.
    #[must_use]
    pub fn now(&self, now: Millis) -> Timestamp {
        if self.base.is_unset() {
            return Timestamp::UNSET;
        }
        let elapsed_secs = now.wrapping_since(self.set_at) / 1_000;
        self.base.saturating_add_secs(u64::from(elapsed_secs))
    }

    /// Moves whole elapsed seconds into the base, keeping the sub-second
    /// remainder, so the counter span stays short.
    pub fn fold(&mut self, now: Millis) {
        if self.base.is_unset() {
            return;
        }
        let elapsed_secs = now.wrapping_since(self.set_at) / 1_000;
        if elapsed_secs > 0 {
            self.base = self.base.saturating_add_secs(u64::from(elapsed_secs));
            self.set_at = self.set_at.wrapping_add(elapsed_secs * 1_000);
        }
    }
}

/// Whether the backup clock takes part in reconciliation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BackupState {
    Unavailable,
    Available,
}

/// Outcome of polling the radio for one tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RadioPoll {
    /// A new fix was adopted this tick.
    pub fresh: bool,
    /// Frame validity reported alongside the poll.
    pub valid: bool,
    /// Status degraded from synced to stale this tick.
    pub went_stale: bool,
}

impl RadioPoll {
    /// A new fix arrived and its frame passed validation.
    #[must_use]
    pub const fn trusted_fix(&self) -> bool {
        self.fresh && self.valid
    }
}

/// Result of one reconciliation pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reconciliation {
    /// The backup clock is not in use or offered nothing usable.
    Skipped,
    InAgreement,
    /// Radio time was pushed to the backup clock. `delta` is adopted minus backup.
    CorrectedBackup { delta: i64 },
    /// Backup time replaced the adopted time.
    AdoptedBackup { delta: i64 },
    /// A previously missing backup clock was written and is now running.
    StartedBackup,
}

/// Authority for the current time.
#[derive(Clone, Debug)]
pub struct TimeArbiter {
    clock: AdoptedClock,
    status: TimeStatus,
    quality: bool,
    last_sync_at: Millis,
    sync_interval_ms: u32,
    backup: BackupState,
    start_pending: bool,
}

impl TimeArbiter {
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            clock: AdoptedClock::unset(),
            status: TimeStatus::NotSet,
            quality: false,
            last_sync_at: Millis::ZERO,
            sync_interval_ms: duration_to_millis(config.sync_interval),
            backup: BackupState::Unavailable,
            start_pending: false,
        }
    }

    #[must_use]
    pub const fn status(&self) -> TimeStatus {
        self.status
    }

    /// Frame validity from the most recent radio poll.
    #[must_use]
    pub const fn quality(&self) -> bool {
        self.quality
    }

    #[must_use]
    pub const fn backup_state(&self) -> BackupState {
        self.backup
    }

    pub fn set_backup_state(&mut self, state: BackupState) {
        self.backup = state;
    }

    #[must_use]
    pub fn adopted(&self, now: Millis) -> Timestamp {
        self.clock.now(now)
    }

    /// Adopts `time` without touching the status. The zero sentinel is ignored.
    pub fn seed(&mut self, time: Timestamp, now: Millis) -> bool {
        if time.is_unset() {
            return false;
        }
        self.clock.set(time, now);
        true
    }

    /// Polls the radio once, adopting a new fix or ageing the status.
    pub fn poll_radio<R: RadioTimeSource>(&mut self, radio: &mut R, now: Millis) -> RadioPoll {
        self.clock.fold(now);
        let fix = radio.current_utc_time().and_then(Timestamp::non_zero);
        self.quality = radio.is_frame_valid();

        let mut poll = RadioPoll {
            fresh: false,
            valid: self.quality,
            went_stale: false,
        };

        if let Some(time) = fix {
            self.clock.set(time, now);
            self.status = TimeStatus::Synced;
            self.last_sync_at = now;
            self.start_pending = true;
            poll.fresh = true;
        } else if self.status == TimeStatus::Synced
            && now.wrapping_since(self.last_sync_at) > self.sync_interval_ms
        {
            self.status = TimeStatus::StaleButValid;
            poll.went_stale = true;
        }

        poll
    }

    /// Whether radio time currently outranks the backup clock.
    #[must_use]
    pub fn radio_authoritative(&self) -> bool {
        self.status == TimeStatus::Synced && self.quality
    }

    /// Compares the adopted time with the backup clock and settles any
    /// disagreement. The backup clock is read at most once.
    pub fn reconcile<W: WallClockPeripheral>(
        &mut self,
        backup: &mut W,
        now: Millis,
    ) -> Reconciliation {
        if self.backup == BackupState::Unavailable {
            return self.try_start_backup(backup, now);
        }

        let reading = backup.read();
        let adopted = self.clock.now(now);
        let delta = adopted.delta_from(reading);
        if delta == 0 {
            return Reconciliation::InAgreement;
        }

        if self.radio_authoritative() && !adopted.is_unset() {
            backup.write(adopted);
            Reconciliation::CorrectedBackup { delta }
        } else if reading.is_unset() {
            Reconciliation::Skipped
        } else {
            self.clock.set(reading, now);
            Reconciliation::AdoptedBackup { delta }
        }
    }

    /// Writes the adopted time to the backup clock regardless of agreement.
    ///
    /// Only a trusted radio time is ever written; returns `true` on write.
    pub fn write_through<W: WallClockPeripheral>(&mut self, backup: &mut W, now: Millis) -> bool {
        let adopted = self.clock.now(now);
        if !self.radio_authoritative() || adopted.is_unset() {
            return false;
        }
        backup.write(adopted);
        if self.backup == BackupState::Unavailable && backup.is_present_and_running() {
            self.backup = BackupState::Available;
        }
        self.start_pending = false;
        true
    }

    /// Re-reads the backup clock after the adopted clock lost track of
    /// elapsed time, e.g. across a processor suspend.
    pub fn reseed_from_backup<W: WallClockPeripheral>(
        &mut self,
        backup: &mut W,
        now: Millis,
    ) -> bool {
        if self.backup == BackupState::Unavailable {
            return false;
        }
        let reading = backup.read();
        self.seed(reading, now)
    }

    fn try_start_backup<W: WallClockPeripheral>(
        &mut self,
        backup: &mut W,
        now: Millis,
    ) -> Reconciliation {
        if !self.start_pending || !self.radio_authoritative() {
            return Reconciliation::Skipped;
        }
        let adopted = self.clock.now(now);
        if adopted.is_unset() {
            return Reconciliation::Skipped;
        }

        // One attempt per radio fix.
        self.start_pending = false;
        backup.write(adopted);
        if backup.is_present_and_running() {
            self.backup = BackupState::Available;
            Reconciliation::StartedBackup
        } else {
            Reconciliation::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    const T0: u64 = 1_700_000_000;

    #[derive(Default)]
    struct ScriptedRadio {
        pending: Option<Timestamp>,
        valid: bool,
    }

    impl RadioTimeSource for ScriptedRadio {
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn current_utc_time(&mut self) -> Option<Timestamp> {
            self.pending.take()
        }
        fn is_frame_valid(&self) -> bool {
            self.valid
        }
        fn bits_received(&self) -> u8 {
            0
        }
        fn last_bit(&self) -> u8 {
            0
        }
    }

    #[derive(Default)]
    struct MockBackup {
        stored: u64,
        running: bool,
        reads: u32,
        writes: Vec<u64, 8>,
    }

    impl WallClockPeripheral for MockBackup {
        fn is_present_and_running(&mut self) -> bool {
            self.running
        }
        fn read(&mut self) -> Timestamp {
            self.reads += 1;
            Timestamp::from_secs(self.stored)
        }
        fn write(&mut self, time: Timestamp) {
            self.stored = time.as_secs();
            self.running = true;
            self.writes.push(time.as_secs()).unwrap();
        }
    }

    fn synced_arbiter(radio_time: u64, valid: bool) -> TimeArbiter {
        let mut arbiter = TimeArbiter::new(SyncConfig::new());
        arbiter.set_backup_state(BackupState::Available);
        let mut radio = ScriptedRadio {
            pending: Some(Timestamp::from_secs(radio_time)),
            valid,
        };
        let poll = arbiter.poll_radio(&mut radio, Millis::ZERO);
        assert!(poll.fresh);
        arbiter
    }

    #[test]
    fn adopted_clock_advances_and_folds() {
        let mut clock = AdoptedClock::unset();
        assert!(clock.now(Millis::from_raw(5_000)).is_unset());

        let start = Millis::from_raw(u32::MAX - 1_499);
        clock.set(Timestamp::from_secs(T0), start);
        let later = start.wrapping_add(2_700);
        assert_eq!(clock.now(later).as_secs(), T0 + 2);

        clock.fold(later);
        assert_eq!(clock.now(later).as_secs(), T0 + 2);
        assert_eq!(clock.now(later.wrapping_add(300)).as_secs(), T0 + 3);
    }

    #[test]
    fn trusted_radio_corrects_backup() {
        let mut arbiter = synced_arbiter(T0, true);
        let mut backup = MockBackup {
            stored: T0 - 42,
            running: true,
            ..MockBackup::default()
        };

        let outcome = arbiter.reconcile(&mut backup, Millis::ZERO);
        assert_eq!(outcome, Reconciliation::CorrectedBackup { delta: 42 });
        assert_eq!(backup.writes.as_slice(), &[T0]);
        assert_eq!(arbiter.adopted(Millis::ZERO).as_secs(), T0);
        assert_eq!(backup.reads, 1);
    }

    #[test]
    fn malformed_frame_never_overwrites_backup() {
        let mut arbiter = synced_arbiter(T0, false);
        let mut backup = MockBackup {
            stored: T0 + 7,
            running: true,
            ..MockBackup::default()
        };

        let outcome = arbiter.reconcile(&mut backup, Millis::ZERO);
        assert_eq!(outcome, Reconciliation::AdoptedBackup { delta: -7 });
        assert!(backup.writes.is_empty());
        assert_eq!(arbiter.adopted(Millis::ZERO).as_secs(), T0 + 7);
        assert_eq!(arbiter.status(), TimeStatus::Synced);
    }

    #[test]
    fn unsynced_pulls_from_backup_without_changing_status() {
        let mut arbiter = TimeArbiter::new(SyncConfig::new());
        arbiter.set_backup_state(BackupState::Available);
        let mut backup = MockBackup {
            stored: T0,
            running: true,
            ..MockBackup::default()
        };

        let outcome = arbiter.reconcile(&mut backup, Millis::from_raw(10));
        assert_eq!(outcome, Reconciliation::AdoptedBackup { delta: -i64::try_from(T0).unwrap() });
        assert_eq!(arbiter.adopted(Millis::from_raw(10)).as_secs(), T0);
        assert_eq!(arbiter.status(), TimeStatus::NotSet);
        assert!(backup.writes.is_empty());
    }

    #[test]
    fn zero_reading_is_never_adopted() {
        let mut arbiter = TimeArbiter::new(SyncConfig::new());
        arbiter.set_backup_state(BackupState::Available);
        arbiter.seed(Timestamp::from_secs(T0), Millis::ZERO);
        let mut backup = MockBackup {
            running: true,
            ..MockBackup::default()
        };

        assert_eq!(
            arbiter.reconcile(&mut backup, Millis::ZERO),
            Reconciliation::Skipped
        );
        assert_eq!(arbiter.adopted(Millis::ZERO).as_secs(), T0);
    }

    #[test]
    fn zero_radio_time_is_ignored() {
        let mut arbiter = TimeArbiter::new(SyncConfig::new());
        let mut radio = ScriptedRadio {
            pending: Some(Timestamp::UNSET),
            valid: true,
        };
        let poll = arbiter.poll_radio(&mut radio, Millis::ZERO);
        assert!(!poll.fresh);
        assert_eq!(arbiter.status(), TimeStatus::NotSet);
    }

    #[test]
    fn synced_goes_stale_after_interval() {
        let mut arbiter = synced_arbiter(T0, true);
        let mut radio = ScriptedRadio::default();

        let poll = arbiter.poll_radio(&mut radio, Millis::from_raw(180_000));
        assert!(!poll.went_stale);
        assert_eq!(arbiter.status(), TimeStatus::Synced);

        let poll = arbiter.poll_radio(&mut radio, Millis::from_raw(180_001));
        assert!(poll.went_stale);
        assert_eq!(arbiter.status(), TimeStatus::StaleButValid);
        assert_eq!(
            arbiter.adopted(Millis::from_raw(180_001)).as_secs(),
            T0 + 180
        );
    }

    #[test]
    fn missing_backup_started_once_per_trusted_fix() {
        let mut arbiter = TimeArbiter::new(SyncConfig::new());
        let mut backup = MockBackup::default();
        assert_eq!(
            arbiter.reconcile(&mut backup, Millis::ZERO),
            Reconciliation::Skipped
        );
        assert_eq!(backup.reads, 0);

        let mut radio = ScriptedRadio {
            pending: Some(Timestamp::from_secs(T0)),
            valid: true,
        };
        arbiter.poll_radio(&mut radio, Millis::ZERO);
        assert_eq!(
            arbiter.reconcile(&mut backup, Millis::ZERO),
            Reconciliation::StartedBackup
        );
        assert_eq!(arbiter.backup_state(), BackupState::Available);
        assert_eq!(backup.writes.as_slice(), &[T0]);
        assert_eq!(
            arbiter.reconcile(&mut backup, Millis::ZERO),
            Reconciliation::InAgreement
        );
    }

    #[test]
    fn write_through_requires_trusted_radio() {
        let mut backup = MockBackup {
            stored: T0,
            running: true,
            ..MockBackup::default()
        };

        let mut untrusted = synced_arbiter(T0 + 5, false);
        assert!(!untrusted.write_through(&mut backup, Millis::ZERO));
        assert!(backup.writes.is_empty());

        let mut trusted = synced_arbiter(T0 + 5, true);
        assert!(trusted.write_through(&mut backup, Millis::from_raw(1_000)));
        assert_eq!(backup.writes.as_slice(), &[T0 + 6]);
    }
}
