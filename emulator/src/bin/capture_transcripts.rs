use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../script.rs"]
mod script;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../sim.rs"]
mod sim;

use clock_core::time::Timestamp;

use session::{RtcStart, Session, SessionOptions};
use sim::HostZone;

/// 2024-03-31 00:30:00 UTC, half an hour before the spring transition.
const SPRING_EVE: u64 = 1_711_845_000;

fn main() -> io::Result<()> {
    record("backup-only", RtcStart::Running(Timestamp::from_secs(SPRING_EVE)), false, &[
        "status",
        "run 61s",
        "status",
        "run 1800s",
        "motion",
        "status",
    ])?;
    record("radio-sync", RtcStart::Stopped, false, &[
        "radio sync 1711845060 bad",
        "run 2s",
        "radio sync 1711845120",
        "status",
        "press 1",
        "radio bits 37 1",
        "radio sync 1711845180",
        "status",
    ])?;
    record("deep-sleep", RtcStart::Running(Timestamp::from_secs(SPRING_EVE)), true, &[
        "light 180",
        "run 61s",
        "rtc set 1711850000",
        "tick 100",
        "motion",
        "status",
    ])?;
    Ok(())
}

fn record(
    name: &str,
    rtc: RtcStart,
    deep_sleep: bool,
    commands: &[&str],
) -> io::Result<()> {
    let mut session = Session::new(SessionOptions {
        deep_sleep,
        zone: HostZone::from_tag("cet").map_err(io::Error::other)?,
        rtc,
        startup_attempts: 40,
        transcript: Some(PathBuf::from(format!("transcripts/{name}.log"))),
        styled: false,
    })?;
    session.boot()?;
    for command in commands {
        session.handle_command(command)?;
    }
    Ok(())
}
