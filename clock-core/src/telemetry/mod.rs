//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! The core never prints. It records strongly typed events into a fixed-size
//! history that the firmware mirrors over `defmt` and the emulator prints to
//! the terminal. Every event kind has a compact numeric code for transports
//! where formatting strings is too expensive.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::keypad::Button;
use crate::mode::ClockMode;
use crate::power::PowerMode;
use crate::time::Millis;

/// Identifier assigned to each telemetry record, wrapping on overflow.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// Trusted radio time was pushed to the backup clock.
    BackupCorrected,
    /// The adopted time was replaced by the backup clock reading.
    AdoptedFromBackup,
    /// The backup clock was absent or stopped at startup.
    BackupMissing,
    /// A missing backup clock was written and is now running.
    BackupStarted,
    RadioSynced,
    RadioStale,
    ButtonPressed(Button),
    ModeChanged(ClockMode),
    PowerChanged(PowerMode),
    /// Write-through after leaving the sync diagnostic.
    ForcedResync,
    /// Startup gave up waiting for the radio.
    StartupTimedOut,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::BackupCorrected => f.write_str("backup-corrected"),
            TelemetryEventKind::AdoptedFromBackup => f.write_str("adopted-from-backup"),
            TelemetryEventKind::BackupMissing => f.write_str("backup-missing"),
            TelemetryEventKind::BackupStarted => f.write_str("backup-started"),
            TelemetryEventKind::RadioSynced => f.write_str("radio-synced"),
            TelemetryEventKind::RadioStale => f.write_str("radio-stale"),
            TelemetryEventKind::ButtonPressed(button) => write!(f, "button-pressed {button}"),
            TelemetryEventKind::ModeChanged(mode) => write!(f, "mode-changed {mode}"),
            TelemetryEventKind::PowerChanged(mode) => write!(f, "power-changed {mode}"),
            TelemetryEventKind::ForcedResync => f.write_str("forced-resync"),
            TelemetryEventKind::StartupTimedOut => f.write_str("startup-timed-out"),
        }
    }
}

impl TelemetryEventKind {
    const BACKUP_CORRECTED_CODE: u16 = 0x0001;
    const ADOPTED_FROM_BACKUP_CODE: u16 = 0x0002;
    const BACKUP_MISSING_CODE: u16 = 0x0003;
    const BACKUP_STARTED_CODE: u16 = 0x0004;
    const RADIO_SYNCED_CODE: u16 = 0x0005;
    const RADIO_STALE_CODE: u16 = 0x0006;
    const FORCED_RESYNC_CODE: u16 = 0x0007;
    const STARTUP_TIMED_OUT_CODE: u16 = 0x0008;
    const BUTTON_PRESSED_BASE: u16 = 0x0010;
    const MODE_CHANGED_BASE: u16 = 0x0020;
    const POWER_CHANGED_BASE: u16 = 0x0030;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::BackupCorrected => Self::BACKUP_CORRECTED_CODE,
            TelemetryEventKind::AdoptedFromBackup => Self::ADOPTED_FROM_BACKUP_CODE,
            TelemetryEventKind::BackupMissing => Self::BACKUP_MISSING_CODE,
            TelemetryEventKind::BackupStarted => Self::BACKUP_STARTED_CODE,
            TelemetryEventKind::RadioSynced => Self::RADIO_SYNCED_CODE,
            TelemetryEventKind::RadioStale => Self::RADIO_STALE_CODE,
            TelemetryEventKind::ForcedResync => Self::FORCED_RESYNC_CODE,
            TelemetryEventKind::StartupTimedOut => Self::STARTUP_TIMED_OUT_CODE,
            TelemetryEventKind::ButtonPressed(button) => {
                Self::BUTTON_PRESSED_BASE + button.number() as u16
            }
            TelemetryEventKind::ModeChanged(mode) => Self::MODE_CHANGED_BASE + mode_index(mode),
            TelemetryEventKind::PowerChanged(mode) => {
                Self::POWER_CHANGED_BASE + power_index(mode)
            }
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Disagreement between the adopted time and the backup clock.
    Correction(CorrectionTelemetry),
    /// Radio frame status at the time of the event.
    Radio(RadioTelemetry),
    /// Power mode change with the time spent in the previous mode.
    Power(PowerTelemetry),
    /// Startup acquisition summary.
    Startup(StartupTelemetry),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Backup clock disagreement payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CorrectionTelemetry {
    /// Adopted time minus backup time, in seconds.
    pub delta_secs: i64,
}

impl CorrectionTelemetry {
    #[must_use]
    pub const fn new(delta_secs: i64) -> Self {
        Self { delta_secs }
    }
}

/// Radio frame payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RadioTelemetry {
    pub frame_valid: bool,
    pub bits_received: u8,
}

impl RadioTelemetry {
    #[must_use]
    pub const fn new(frame_valid: bool, bits_received: u8) -> Self {
        Self {
            frame_valid,
            bits_received,
        }
    }
}

/// Power transition payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PowerTelemetry {
    pub from: PowerMode,
    pub to: PowerMode,
    pub elapsed_in_previous: Option<Duration>,
}

/// Startup acquisition payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StartupTelemetry {
    pub attempts: u16,
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

impl TelemetryInstant for Millis {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(u64::from(self.saturating_since(earlier)))
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_power_change_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_power_change_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Identifier the next record will receive.
    pub fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns records with ids at or after `cursor`, oldest first.
    ///
    /// Records already overwritten by the ring are skipped silently.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        let pending = self.next_event_id.wrapping_sub(cursor);
        self.oldest_first()
            .filter(move |record| self.next_event_id.wrapping_sub(record.id) <= pending)
    }

    /// Records a disagreement between the adopted time and the backup clock.
    pub fn record_correction(
        &mut self,
        event: TelemetryEventKind,
        delta_secs: i64,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            event,
            TelemetryPayload::Correction(CorrectionTelemetry::new(delta_secs)),
            timestamp,
        )
    }

    /// Records a power mode change and captures the time spent in the previous mode.
    pub fn record_power_change(
        &mut self,
        from: PowerMode,
        to: PowerMode,
        timestamp: TInstant,
    ) -> EventId {
        let elapsed = self
            .last_power_change_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_power_change_at = Some(timestamp);

        let payload = TelemetryPayload::Power(PowerTelemetry {
            from,
            to,
            elapsed_in_previous: elapsed,
        });
        self.record(TelemetryEventKind::PowerChanged(to), payload, timestamp)
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Correction(details) => write!(f, "delta={}s", details.delta_secs),
            TelemetryPayload::Radio(details) => write!(
                f,
                "valid={} bits={}",
                details.frame_valid, details.bits_received
            ),
            TelemetryPayload::Power(details) => {
                write!(f, "{} -> {}", details.from, details.to)?;
                if let Some(elapsed) = details.elapsed_in_previous {
                    write!(f, " after {}ms", elapsed.as_millis())?;
                }
                Ok(())
            }
            TelemetryPayload::Startup(details) => write!(f, "attempts={}", details.attempts),
        }
    }
}

const fn mode_index(mode: ClockMode) -> u16 {
    match mode {
        ClockMode::Normal => 0,
        ClockMode::SyncDisplay => 1,
    }
}

const fn power_index(mode: PowerMode) -> u16 {
    match mode {
        PowerMode::Active => 0,
        PowerMode::DisplayOff => 1,
        PowerMode::DeepSleep => 2,
    }
}
