mod script;
mod session;
mod sim;

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clock_core::config::SyncConfig;
use clock_core::time::Timestamp;

use session::{RtcStart, Session, SessionOptions};
use sim::HostZone;

const USAGE: &str = "Usage: clock-emulator [--deep-sleep] [--zone <cet|utc>] \
[--rtc <epoch|now|stopped|absent>] [--attempts <n>] [--transcript <path>]";

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Radio clock emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for response in session.boot()? {
        writeln!(writer, "{response}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<SessionOptions, String> {
    let mut options = SessionOptions {
        deep_sleep: false,
        zone: HostZone::from_tag("cet")?,
        rtc: RtcStart::Running(host_now()),
        startup_attempts: SyncConfig::new().startup_attempts,
        transcript: None,
        styled: io::stdout().is_terminal(),
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("Expected value after {flag}"))
        };
        match arg.as_str() {
            "--deep-sleep" => options.deep_sleep = true,
            "--zone" => options.zone = HostZone::from_tag(&value("--zone")?)?,
            "--rtc" => options.rtc = parse_rtc(&value("--rtc")?)?,
            "--attempts" => {
                let raw = value("--attempts")?;
                options.startup_attempts = raw
                    .parse()
                    .map_err(|_| format!("Invalid attempt count `{raw}`"))?;
            }
            "--transcript" => {
                options.transcript = Some(PathBuf::from(value("--transcript")?));
                options.styled = false;
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }
    Ok(options)
}

fn parse_rtc(tag: &str) -> Result<RtcStart, String> {
    match tag {
        "now" => Ok(RtcStart::Running(host_now())),
        "stopped" => Ok(RtcStart::Stopped),
        "absent" => Ok(RtcStart::Absent),
        epoch => epoch
            .parse()
            .map(|secs| RtcStart::Running(Timestamp::from_secs(secs)))
            .map_err(|_| format!("Invalid rtc setting `{epoch}`")),
    }
}

fn host_now() -> Timestamp {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    Timestamp::from_secs(secs)
}
