use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept either a count (`0`..=`4`) or a level name, as `NODE_ADMIN_LOG_LEVEL`
/// may carry both.
fn parse_log_level(level: &str) -> Result<u8, String> {
    let level = level.trim();
    if let Ok(count) = level.parse::<u8>() {
        return if usize::from(count) < LEVEL_NAMES.len() {
            Ok(count)
        } else {
            Err(format!("log level out of range: {count}"))
        };
    }

    LEVEL_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level: {level}"))
}

/// Tracing level for a `-v` count; `None` keeps the default (ERROR).
#[must_use]
pub const fn tracing_level(count: u8) -> Option<Level> {
    match count {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("NODE_ADMIN_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(parse_log_level)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_counts() {
        assert_eq!(parse_log_level("info"), Ok(2));
        assert_eq!(parse_log_level("DEBUG"), Ok(3));
        assert_eq!(parse_log_level(" warn "), Ok(1));
        assert_eq!(parse_log_level("4"), Ok(4));
        assert!(parse_log_level("5").is_err());
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn counts_map_to_levels() {
        assert_eq!(tracing_level(0), None);
        assert_eq!(tracing_level(1), Some(Level::WARN));
        assert_eq!(tracing_level(3), Some(Level::DEBUG));
        assert_eq!(tracing_level(7), Some(Level::TRACE));
    }

    #[test]
    fn repeated_flag_counts() {
        let matches = with_args(Command::new("test")).get_matches_from(["test", "-vv"]);
        assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(2));
    }
}
