use crate::cli::{
    actions::Action,
    commands::{self, logging},
    dispatch, telemetry,
};
use anyhow::Result;

/// Parse arguments, install logging and build the action to run.
///
/// # Errors
///
/// Returns an error if telemetry cannot be initialized or the configuration is
/// invalid.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches
        .get_one::<u8>(logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);

    telemetry::init(logging::tracing_level(verbosity))?;

    dispatch::handler(&matches)
}
