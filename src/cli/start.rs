use crate::cli::{
    actions::Action,
    commands::{self, logging},
    dispatch,
    telemetry::{self, LogFormat, Telemetry},
};
use anyhow::Result;

/// Map verbosity count to tracing level
const fn get_verbosity_level(verbosity: u8) -> Option<tracing::Level> {
    match verbosity {
        0 => None,
        1 => Some(tracing::Level::WARN),
        2 => Some(tracing::Level::INFO),
        3 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Parse arguments, initialize telemetry and return the action to run.
///
/// # Errors
///
/// Returns an error if telemetry initialization or action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity_level = get_verbosity_level(
        matches
            .get_one::<u8>(logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );
    let format = matches
        .get_one::<String>(logging::ARG_LOG_FORMAT)
        .map(|format| format.parse::<LogFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();

    telemetry::init(&Telemetry::from_env(verbosity_level, format))?;

    dispatch::handler(&matches)
}
