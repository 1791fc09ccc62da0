//! Logging for model building and solving, based on `fern`.
//!
//! Warnings and errors go to stderr, everything else to stdout, with colours if the stream is a
//! terminal. Optionally, the same messages are copied to a log file in a given directory. The
//! level can be overridden through the `ESM_STORAGE_LOG_LEVEL` environment variable.
use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{Level, LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The log level used if neither the settings nor the environment give one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The environment variable which overrides the configured log level
pub const LOG_LEVEL_ENV_VAR: &str = "ESM_STORAGE_LOG_LEVEL";

/// Name of the log file written to the log directory
const LOG_FILE_NAME: &str = "esm_storage.log";

/// Whether [`init`] has succeeded
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Initialise the logger.
///
/// The level is taken from `ESM_STORAGE_LOG_LEVEL` if set, else from `log_level_from_settings`,
/// else [`DEFAULT_LOG_LEVEL`].
///
/// # Arguments
///
/// * `log_level_from_settings` - The log level given in `settings.toml`
/// * `log_dir` - If given, a directory in which to also write a plain-text log file
pub fn init(log_level_from_settings: Option<&str>, log_dir: Option<&Path>) -> Result<()> {
    let log_level = match env::var(LOG_LEVEL_ENV_VAR) {
        Ok(level) => level,
        Err(_) => log_level_from_settings
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string(),
    };
    let log_level = parse_log_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let mut dispatch = Dispatch::new()
        .level(log_level)
        .chain(
            terminal_dispatch(colours, std::io::stdout().is_terminal(), |level| {
                level > Level::Warn
            })
            .chain(std::io::stdout()),
        )
        .chain(
            terminal_dispatch(colours, std::io::stderr().is_terminal(), |level| {
                level <= Level::Warn
            })
            .chain(std::io::stderr()),
        );

    if let Some(log_dir) = log_dir {
        let path = log_dir.join(LOG_FILE_NAME);
        let file = File::create(&path)
            .with_context(|| format!("Could not create log file {}", path.display()))?;
        dispatch = dispatch.chain(Dispatch::new().format(write_log_plain).chain(file));
    }

    dispatch.apply().context("Logger already initialised")?;
    let _ = LOGGER_INIT.set(());

    Ok(())
}

/// A dispatch for messages whose level passes `accept`, optionally coloured
fn terminal_dispatch(
    colours: ColoredLevelConfig,
    use_colour: bool,
    accept: fn(Level) -> bool,
) -> Dispatch {
    Dispatch::new()
        .filter(move |metadata| accept(metadata.level()))
        .format(move |out, message, record| {
            if use_colour {
                write_log(out, colours.color(record.level()), record.target(), message);
            } else {
                write_log_plain(out, message, record);
            }
        })
}

/// Convert a log level string (case insensitive) to a [`LevelFilter`]
pub fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(log_level)
        .ok()
        .with_context(|| format!("Unknown log level: {log_level}"))
}

fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");
    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("WARN", LevelFilter::Warn)]
    #[case("info", LevelFilter::Info)]
    #[case("Debug", LevelFilter::Debug)]
    fn test_parse_log_level(#[case] input: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_log_level(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_log_level_unknown() {
        assert_error!(parse_log_level("verbose"), "Unknown log level: verbose");
    }
}
