//! Command grammar for the emulator console.
//!
//! Keywords are case-insensitive. Durations accept an `ms` or `s` suffix and
//! default to milliseconds.

use clock_core::keypad::Button;
use clock_core::time::Timestamp;
use winnow::ascii::{dec_uint, space0, space1};
use winnow::combinator::{alt, eof, fail, opt, preceded, terminated};
use winnow::error::{ContextError, ErrMode, ParseError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MotionAction {
    /// A single edge: the sensor fires and drops again.
    Pulse,
    Hold,
    Release,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RadioAction {
    Sync { utc: Timestamp, valid: bool },
    Bits { count: u8, last_bit: u8 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RtcAction {
    Set(Timestamp),
    Stop,
    Remove,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptCommand<'a> {
    Tick(u32),
    /// Run for a duration in milliseconds.
    Run(u32),
    Light(u16),
    Press(Button),
    Motion(MotionAction),
    Radio(RadioAction),
    Rtc(RtcAction),
    Status,
    Help(Option<&'a str>),
}

pub type ScriptError<'a> = ParseError<&'a str, ContextError>;

/// Parses one console line.
pub fn parse_line(line: &str) -> Result<ScriptCommand<'_>, ScriptError<'_>> {
    terminated(command, (space0, eof)).parse(line.trim())
}

fn word<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}

fn command<'s>(input: &mut &'s str) -> ModalResult<ScriptCommand<'s>> {
    let name = word
        .context(StrContext::Label("command"))
        .parse_next(input)?;
    match name.to_ascii_lowercase().as_str() {
        "tick" => opt(preceded(space1, dec_uint))
            .map(|count: Option<u32>| ScriptCommand::Tick(count.unwrap_or(1)))
            .parse_next(input),
        "run" => preceded(space1, duration_ms)
            .map(ScriptCommand::Run)
            .parse_next(input),
        "light" => preceded(space1, dec_uint)
            .context(StrContext::Label("light sample"))
            .map(ScriptCommand::Light)
            .parse_next(input),
        "press" => preceded(space1, button)
            .map(ScriptCommand::Press)
            .parse_next(input),
        "motion" => opt(preceded(space1, motion_action))
            .map(|action| ScriptCommand::Motion(action.unwrap_or(MotionAction::Pulse)))
            .parse_next(input),
        "radio" => preceded(space1, radio_action)
            .map(ScriptCommand::Radio)
            .parse_next(input),
        "rtc" => preceded(space1, rtc_action)
            .map(ScriptCommand::Rtc)
            .parse_next(input),
        "status" => Ok(ScriptCommand::Status),
        "help" => opt(preceded(space1, word))
            .map(ScriptCommand::Help)
            .parse_next(input),
        _ => fail
            .context(StrContext::Expected(StrContextValue::Description(
                "a known command",
            )))
            .parse_next(input),
    }
}

fn keyword<'s>(expected: &'static str) -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    word.verify(move |found: &str| found.eq_ignore_ascii_case(expected))
        .context(StrContext::Expected(StrContextValue::StringLiteral(expected)))
}

fn duration_ms(input: &mut &str) -> ModalResult<u32> {
    (dec_uint, opt(alt(("ms", "s"))))
        .verify_map(|(value, unit): (u32, Option<&str>)| match unit {
            Some("s") => value.checked_mul(1_000),
            _ => Some(value),
        })
        .context(StrContext::Label("duration"))
        .parse_next(input)
}

fn button(input: &mut &str) -> ModalResult<Button> {
    dec_uint
        .verify_map(|number: u8| {
            number
                .checked_sub(1)
                .and_then(|index| Button::from_index(usize::from(index)))
        })
        .context(StrContext::Expected(StrContextValue::Description(
            "button 1-4",
        )))
        .parse_next(input)
}

fn epoch(input: &mut &str) -> ModalResult<Timestamp> {
    dec_uint
        .map(Timestamp::from_secs)
        .context(StrContext::Label("epoch seconds"))
        .parse_next(input)
}

fn motion_action(input: &mut &str) -> ModalResult<MotionAction> {
    alt((
        keyword("hold").value(MotionAction::Hold),
        keyword("release").value(MotionAction::Release),
    ))
    .parse_next(input)
}

fn radio_action(input: &mut &str) -> ModalResult<RadioAction> {
    alt((
        preceded(
            (keyword("sync"), space1),
            (epoch, opt(preceded(space1, keyword("bad")))),
        )
        .map(|(utc, bad)| RadioAction::Sync {
            utc,
            valid: bad.is_none(),
        }),
        preceded(
            (keyword("bits"), space1),
            (dec_uint, preceded(space1, alt(("0", "1")))),
        )
        .map(|(count, bit): (u8, &str)| RadioAction::Bits {
            count,
            last_bit: u8::from(bit == "1"),
        }),
    ))
    .parse_next(input)
}

fn rtc_action(input: &mut &str) -> ModalResult<RtcAction> {
    alt((
        preceded((keyword("set"), space1), epoch).map(RtcAction::Set),
        keyword("stop").value(RtcAction::Stop),
        keyword("absent").value(RtcAction::Remove),
    ))
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tick_with_default_count() {
        assert_eq!(parse_line("tick"), Ok(ScriptCommand::Tick(1)));
        assert_eq!(parse_line("TICK 25"), Ok(ScriptCommand::Tick(25)));
    }

    #[test]
    fn parses_durations_with_units() {
        assert_eq!(parse_line("run 500"), Ok(ScriptCommand::Run(500)));
        assert_eq!(parse_line("run 500ms"), Ok(ScriptCommand::Run(500)));
        assert_eq!(parse_line("run 90s"), Ok(ScriptCommand::Run(90_000)));
    }

    #[test]
    fn parses_buttons_in_range() {
        assert_eq!(parse_line("press 1"), Ok(ScriptCommand::Press(Button::One)));
        assert_eq!(parse_line("press 4"), Ok(ScriptCommand::Press(Button::Four)));
        assert!(parse_line("press 0").is_err());
        assert!(parse_line("press 5").is_err());
    }

    #[test]
    fn parses_radio_actions() {
        assert_eq!(
            parse_line("radio sync 1700000000"),
            Ok(ScriptCommand::Radio(RadioAction::Sync {
                utc: Timestamp::from_secs(1_700_000_000),
                valid: true,
            }))
        );
        assert_eq!(
            parse_line("radio sync 1700000000 bad"),
            Ok(ScriptCommand::Radio(RadioAction::Sync {
                utc: Timestamp::from_secs(1_700_000_000),
                valid: false,
            }))
        );
        assert_eq!(
            parse_line("radio bits 37 1"),
            Ok(ScriptCommand::Radio(RadioAction::Bits {
                count: 37,
                last_bit: 1,
            }))
        );
    }

    #[test]
    fn parses_rtc_and_motion_actions() {
        assert_eq!(
            parse_line("rtc set 42"),
            Ok(ScriptCommand::Rtc(RtcAction::Set(Timestamp::from_secs(42))))
        );
        assert_eq!(parse_line("rtc stop"), Ok(ScriptCommand::Rtc(RtcAction::Stop)));
        assert_eq!(
            parse_line("rtc absent"),
            Ok(ScriptCommand::Rtc(RtcAction::Remove))
        );
        assert_eq!(
            parse_line("motion"),
            Ok(ScriptCommand::Motion(MotionAction::Pulse))
        );
        assert_eq!(
            parse_line("motion hold"),
            Ok(ScriptCommand::Motion(MotionAction::Hold))
        );
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(parse_line("help"), Ok(ScriptCommand::Help(None)));
        assert_eq!(parse_line("help radio"), Ok(ScriptCommand::Help(Some("radio"))));
    }

    #[test]
    fn rejects_unknown_and_trailing_input() {
        assert!(parse_line("reboot now").is_err());
        assert!(parse_line("status now").is_err());
        assert!(parse_line("light bright").is_err());
    }
}
