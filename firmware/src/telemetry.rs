//! Mirrors controller telemetry to defmt on target and stdout on the host.
//!
//! The controller only records events; this module drains the records added
//! since the last pass and formats them for the console.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt;

use clock_core::telemetry::{EventId, TelemetryRecord, TelemetryRecorder};
use clock_core::time::Millis;

/// Cursor over a controller's telemetry ring.
#[derive(Debug, Default)]
pub struct TelemetryMirror {
    cursor: EventId,
}

impl TelemetryMirror {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Logs every record added since the previous call. Returns how many were logged.
    pub fn drain<const N: usize>(&mut self, recorder: &TelemetryRecorder<Millis, N>) -> usize {
        let mut logged = 0;
        for record in recorder.since(self.cursor) {
            log_record(record);
            logged += 1;
        }
        self.cursor = recorder.next_id();
        logged
    }
}

fn log_record(record: &TelemetryRecord<Millis>) {
    emit_log(
        record.id,
        record.timestamp.raw(),
        &record.event,
        &record.details,
    );
}

#[cfg(target_os = "none")]
fn emit_log(
    id: EventId,
    at_ms: u32,
    event: &dyn fmt::Display,
    details: &dyn fmt::Display,
) {
    defmt::info!(
        "telemetry #{} t={}ms {} {}",
        id,
        at_ms,
        defmt::Display2Format(event),
        defmt::Display2Format(details)
    );
}

#[cfg(not(target_os = "none"))]
fn emit_log(
    id: EventId,
    at_ms: u32,
    event: &dyn fmt::Display,
    details: &dyn fmt::Display,
) {
    println!("telemetry #{id} t={at_ms}ms {event} {details}");
}

/// Logs a driver failure that the controller cannot see.
#[cfg(target_os = "none")]
pub fn log_driver_error(driver: &'static str, error: &dyn fmt::Debug) {
    defmt::warn!("{} error: {}", driver, defmt::Debug2Format(error));
}

#[cfg(not(target_os = "none"))]
pub fn log_driver_error(driver: &'static str, error: &dyn fmt::Debug) {
    println!("{driver} error: {error:?}");
}
