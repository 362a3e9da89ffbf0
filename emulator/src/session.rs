use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clock_core::config::{ClockConfig, PowerConfig, SyncConfig};
use clock_core::controller::{ClockController, TickInput};
use clock_core::keypad::Button;
use clock_core::power::MotionCell;
use clock_core::telemetry::EventId;
use clock_core::time::{Millis, Timestamp, duration_to_millis};

use crate::script::{self, MotionAction, RadioAction, RtcAction, ScriptCommand};
use crate::sim::{HostZone, SimBackupClock, SimClock, SimPacer, SimRadio, TerminalDisplay};

/// Keypad reading with no button held.
const KEYPAD_IDLE: u16 = 1023;
/// Ambient light reading until a `light` command changes it.
const DEFAULT_LIGHT: u16 = 40;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("tick", "tick [count]                  - advance one or more 20 ms ticks"),
    ("run", "run <duration>                - advance by a duration (ms or s suffix)"),
    ("light", "light <sample>                - set the ambient light reading"),
    ("press", "press <1-4>                   - tap a keypad button"),
    (
        "motion",
        "motion [hold|release]         - fire the motion sensor or hold its line",
    ),
    (
        "radio",
        "radio sync <epoch> [bad] | radio bits <count> <0|1>  - feed the receiver",
    ),
    (
        "rtc",
        "rtc set <epoch> | rtc stop | rtc absent  - manipulate the backup clock",
    ),
    ("status", "status                        - show controller state"),
    ("help", "help [topic]                  - show help for a command"),
];

/// How the simulated backup clock starts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RtcStart {
    Running(Timestamp),
    Stopped,
    Absent,
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub deep_sleep: bool,
    pub zone: HostZone,
    pub rtc: RtcStart,
    pub startup_attempts: u16,
    pub transcript: Option<PathBuf>,
    pub styled: bool,
}

type HostController = ClockController<SimRadio, SimBackupClock, TerminalDisplay, HostZone>;

pub struct Session {
    clock: SimClock,
    motion: MotionCell,
    controller: HostController,
    zone: HostZone,
    light: u16,
    keypad: u16,
    motion_held: bool,
    suspended: bool,
    telemetry_cursor: EventId,
    transcript: Option<TranscriptLogger>,
    styled: bool,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let config = ClockConfig {
            power: PowerConfig {
                deep_sleep: options.deep_sleep,
                ..PowerConfig::new()
            },
            sync: SyncConfig {
                startup_attempts: options.startup_attempts,
                ..SyncConfig::new()
            },
            ..ClockConfig::new()
        };

        let clock = SimClock::starting_at(0);
        let backup = match options.rtc {
            RtcStart::Running(utc) => SimBackupClock::running_at(clock.clone(), utc),
            RtcStart::Stopped => SimBackupClock::stopped(clock.clone()),
            RtcStart::Absent => SimBackupClock::absent(clock.clone()),
        };
        let controller = ClockController::new(
            config,
            SimRadio::default(),
            backup,
            TerminalDisplay::default(),
            options.zone,
        )
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        let transcript = options
            .transcript
            .as_deref()
            .map(TranscriptLogger::new)
            .transpose()?;

        Ok(Self {
            clock,
            motion: MotionCell::new(),
            controller,
            zone: options.zone,
            light: DEFAULT_LIGHT,
            keypad: KEYPAD_IDLE,
            motion_held: false,
            suspended: false,
            telemetry_cursor: 0,
            transcript,
            styled: options.styled,
        })
    }

    /// Runs startup acquisition and the first tick.
    pub fn boot(&mut self) -> io::Result<Vec<String>> {
        let pause_ms = duration_to_millis(self.controller.config().sync.startup_pause);
        let mut pacer = SimPacer::new(self.clock.clone(), pause_ms);
        let outcome = self.controller.startup(&mut pacer);

        let mut lines = vec![format!(
            "startup {outcome:?} after {}ms",
            self.clock.now().raw()
        )];
        self.drain_telemetry(&mut lines);
        self.step(&mut lines);
        self.push_face(&mut lines);
        self.record_output(&lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(self.clock.now(), TranscriptRole::Host, trimmed)?;
        }

        let mut lines = Vec::new();
        match script::parse_line(trimmed) {
            Ok(command) => self.execute(command, &mut lines),
            Err(err) => lines.push(format!(
                "ERR syntax at column {}: {}",
                err.offset(),
                err.inner()
            )),
        }
        self.push_face(&mut lines);
        self.record_output(&lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: ScriptCommand<'_>, lines: &mut Vec<String>) {
        match command {
            ScriptCommand::Tick(count) => self.steps(count, lines),
            ScriptCommand::Run(ms) => {
                let count = (ms / self.tick_ms()).max(1);
                self.steps(count, lines);
            }
            ScriptCommand::Light(sample) => {
                self.light = sample;
                lines.push(format!("OK light={sample}"));
            }
            ScriptCommand::Press(button) => self.press(button, lines),
            ScriptCommand::Motion(action) => self.motion(action, lines),
            ScriptCommand::Radio(action) => self.radio(action, lines),
            ScriptCommand::Rtc(action) => self.rtc(action, lines),
            ScriptCommand::Status => self.status(lines),
            ScriptCommand::Help(topic) => help(topic, lines),
        }
    }

    fn tick_ms(&self) -> u32 {
        duration_to_millis(self.controller.config().tick_interval).max(1)
    }

    fn steps(&mut self, count: u32, lines: &mut Vec<String>) {
        for _ in 0..count {
            self.step(lines);
        }
    }

    /// One scheduler period. While suspended, time passes without a tick.
    fn step(&mut self, lines: &mut Vec<String>) {
        let now = self.clock.advance(self.tick_ms());
        if self.suspended {
            return;
        }
        let input = TickInput {
            now,
            light_sample: self.light,
            keypad_sample: self.keypad,
            motion: self.motion.snapshot(),
            motion_asserted: self.motion_held,
        };
        let report = self.controller.tick(input);
        if let Some(button) = report.button {
            lines.push(format!("keypad {button}"));
        }
        self.drain_telemetry(lines);
        if report.suspend {
            self.suspended = true;
            lines.push("suspended until motion".to_string());
        }
    }

    fn press(&mut self, button: Button, lines: &mut Vec<String>) {
        let ladder = self.controller.config().keypad.ladder;
        let Some(sample) = ladder.get(button.index()).copied() else {
            lines.push(format!("ERR {button} is not wired"));
            return;
        };
        let held_ms = duration_to_millis(self.controller.config().keypad.pressed_time);
        self.keypad = sample;
        self.steps(held_ms / self.tick_ms() + 3, lines);
        self.keypad = KEYPAD_IDLE;
        self.step(lines);
    }

    fn motion(&mut self, action: MotionAction, lines: &mut Vec<String>) {
        match action {
            MotionAction::Release => {
                self.motion_held = false;
                lines.push("OK motion released".to_string());
                return;
            }
            MotionAction::Hold => self.motion_held = true,
            MotionAction::Pulse => {}
        }
        let now = self.clock.now();
        self.motion.record(now);
        lines.push(format!("OK motion at {}ms", now.raw()));
        if self.suspended {
            self.suspended = false;
            self.controller.resume(now);
            lines.push("resumed".to_string());
            self.drain_telemetry(lines);
        }
    }

    fn radio(&mut self, action: RadioAction, lines: &mut Vec<String>) {
        match action {
            RadioAction::Sync { utc, valid } => {
                if !self.controller.radio().is_running() {
                    lines.push("ERR radio is powered down".to_string());
                    return;
                }
                self.controller.radio_mut().deliver(utc, valid);
                lines.push(format!(
                    "OK frame utc={} {}",
                    utc.as_secs(),
                    if valid { "valid" } else { "malformed" }
                ));
            }
            RadioAction::Bits { count, last_bit } => {
                self.controller.radio_mut().set_progress(count, last_bit);
                lines.push(format!("OK bits={count} last={last_bit}"));
            }
        }
        self.step(lines);
    }

    fn rtc(&mut self, action: RtcAction, lines: &mut Vec<String>) {
        let backup = self.controller.backup_mut();
        match action {
            RtcAction::Set(utc) => {
                backup.set_time(utc);
                lines.push(format!("OK rtc utc={}", utc.as_secs()));
            }
            RtcAction::Stop => {
                backup.halt();
                lines.push("OK rtc halted".to_string());
            }
            RtcAction::Remove => {
                backup.remove();
                lines.push("OK rtc removed".to_string());
            }
        }
    }

    fn status(&self, lines: &mut Vec<String>) {
        let now = self.clock.now();
        let controller = &self.controller;
        lines.push(format!(
            "mode={} power={} time={} quality={} backup={:?} suspended={}",
            controller.mode(),
            controller.power_mode(),
            controller.time_status(),
            if controller.sync_quality() { "ok" } else { "bad" },
            controller.backup_state(),
            self.suspended,
        ));

        let utc = controller.adopted_time(now);
        match controller.local_time(now) {
            Some(local) => lines.push(format!(
                "utc={} local={:04}-{:02}-{:02} {:02}:{:02}:{:02} {}",
                utc.as_secs(),
                local.year,
                local.month,
                local.day,
                local.hour,
                local.minute,
                local.second,
                self.zone.label(utc),
            )),
            None => lines.push("utc=unset".to_string()),
        }

        let backup = controller.backup();
        lines.push(format!(
            "brightness={} keypad={:?} light={} rtc-present={} rtc-running={} rtc-writes={}",
            controller.brightness(),
            controller.keypad_state(),
            self.light,
            backup.is_present(),
            backup.is_running(),
            backup.writes(),
        ));
        lines.push(format!("uptime={}ms", now.raw()));
    }

    fn push_face(&mut self, lines: &mut Vec<String>) {
        let display = self.controller.display_mut();
        if display.take_dirty() {
            lines.push(display.render(self.styled));
        }
    }

    fn drain_telemetry(&mut self, lines: &mut Vec<String>) {
        let telemetry = self.controller.telemetry();
        for record in telemetry.since(self.telemetry_cursor) {
            lines.push(format!(
                "telemetry #{} t={}ms {} {}",
                record.id,
                record.timestamp.raw(),
                record.event,
                record.details
            ));
        }
        self.telemetry_cursor = telemetry.next_id();
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let Some(transcript) = self.transcript.as_mut() else {
            return Ok(());
        };
        let now = self.clock.now();
        for line in lines {
            transcript.append_line(now, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn help(topic: Option<&str>, lines: &mut Vec<String>) {
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Radio clock emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now: Millis, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>9} ms] {} {}",
            now.raw(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clock_core::display::DisplayText;
    use clock_core::mode::ClockMode;
    use clock_core::power::PowerMode;
    use clock_core::timezone::FixedOffset;

    /// 2023-11-14 22:13:20 UTC.
    const T0: u64 = 1_700_000_000;

    fn options() -> SessionOptions {
        SessionOptions {
            deep_sleep: false,
            zone: HostZone::Fixed(FixedOffset::UTC),
            rtc: RtcStart::Running(Timestamp::from_secs(T0)),
            startup_attempts: 4,
            transcript: None,
            styled: false,
        }
    }

    fn booted(options: SessionOptions) -> (Session, Vec<String>) {
        let mut session = Session::new(options).unwrap();
        let lines = session.boot().unwrap();
        (session, lines)
    }

    #[test]
    fn boot_from_backup_shows_unsynced_face() {
        let (session, lines) = booted(options());
        assert_eq!(lines[0], "startup FromBackup after 0ms");
        assert_eq!(
            lines.last().map(String::as_str),
            Some("display [22:13] level=12 ALARM")
        );
        assert_eq!(
            session.controller.display().text(),
            Some(DisplayText::clock(22, 13))
        );
    }

    #[test]
    fn trusted_frame_corrects_backup() {
        let (mut session, _) = booted(options());
        let lines = session.handle_command("radio sync 1700000100").unwrap();
        assert!(lines.iter().any(|line| line.contains("radio-synced")));
        assert!(lines.iter().any(|line| line.contains("backup-corrected")));
        assert_eq!(session.controller.backup().writes(), 1);
        assert!(!session.controller.display().alarm());
    }

    #[test]
    fn malformed_frame_leaves_backup_alone() {
        let (mut session, _) = booted(options());
        session.handle_command("radio sync 1700000100 bad").unwrap();
        assert_eq!(session.controller.backup().writes(), 0);
        assert_eq!(
            session.controller.adopted_time(session.clock.now()).as_secs(),
            T0
        );
    }

    #[test]
    fn toggle_button_enters_sync_diagnostic() {
        let (mut session, _) = booted(options());
        let lines = session.handle_command("press 1").unwrap();
        assert!(lines.iter().any(|line| line == "keypad button-1"));
        assert_eq!(session.controller.mode(), ClockMode::SyncDisplay);

        session.handle_command("radio bits 12 1").unwrap();
        assert_eq!(
            session.controller.display().text(),
            Some(DisplayText::sync_progress(1, 12))
        );
    }

    #[test]
    fn deep_sleep_suspends_until_motion() {
        let (mut session, _) = booted(SessionOptions {
            deep_sleep: true,
            ..options()
        });
        let lines = session.handle_command("run 61s").unwrap();
        assert!(lines.iter().any(|line| line == "suspended until motion"));
        assert!(!session.controller.radio().is_running());
        assert!(!session.controller.display().is_lit());

        session.handle_command("tick 50").unwrap();
        assert!(session.suspended);

        let lines = session.handle_command("motion").unwrap();
        assert!(lines.iter().any(|line| line == "resumed"));
        assert_eq!(session.controller.power_mode(), PowerMode::Active);
        assert!(session.controller.display().is_lit());
        assert!(session.controller.radio().is_running());
    }

    #[test]
    fn absent_backup_times_out_to_dashes() {
        let (session, lines) = booted(SessionOptions {
            rtc: RtcStart::Absent,
            ..options()
        });
        assert_eq!(lines[0], "startup Unsynced after 1000ms");
        assert!(lines.iter().any(|line| line.contains("startup-timed-out")));
        assert_eq!(session.controller.display().text(), Some(DisplayText::UNSET));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let (mut session, _) = booted(options());
        let lines = session.handle_command("reboot now").unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR syntax"));
    }

    #[test]
    fn transcript_records_host_and_emulator_lines() {
        let dir = std::env::temp_dir().join(format!("clock-emulator-{}", std::process::id()));
        let path = dir.join("session.log");
        {
            let (mut session, _) = booted(SessionOptions {
                transcript: Some(path.clone()),
                ..options()
            });
            session.handle_command("status").unwrap();
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# Radio clock emulator transcript"));
        assert!(contents.contains("HOST> status"));
        assert!(contents.contains("EMU < mode=normal power=active"));
        fs::remove_dir_all(dir).unwrap();
    }
}
