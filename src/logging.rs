//! Process-wide logger bootstrap.
//!
//! All modules log through the `log` facade; this starts the
//! `flexi_logger` backend writing to stderr. Initialization happens at most
//! once per process and never panics.

use flexi_logger::{Logger, LoggerHandle};
use log::info;
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};

static LOGGER: OnceCell<LoggerState> = OnceCell::new();

struct LoggerState {
    level: String,
    _handle: LoggerHandle,
}

/// Starts logging at `level` (any `flexi_logger` spec, e.g. `info` or
/// `laundry=debug,sqlx=warn`).
///
/// Calling again with the same level is a no-op; a different level is
/// rejected because the backend cannot be swapped once running.
pub fn init_logging(level: &str) -> Result<()> {
    let level = level.trim();
    if level.is_empty() {
        return Err(Error::Logging("log level must not be empty".to_string()));
    }

    if let Some(state) = LOGGER.get() {
        return check_same_level(&state.level, level);
    }

    let state = LOGGER.get_or_try_init(|| -> Result<LoggerState> {
        let handle = Logger::try_with_env_or_str(level)
            .map_err(|err| Error::Logging(format!("invalid log level `{level}`: {err}")))?
            .log_to_stderr()
            .format(flexi_logger::detailed_format)
            .start()
            .map_err(|err| Error::Logging(format!("failed to start logger: {err}")))?;

        info!(
            "logging started: level={} version={}",
            level,
            env!("CARGO_PKG_VERSION")
        );

        Ok(LoggerState {
            level: level.to_string(),
            _handle: handle,
        })
    })?;

    check_same_level(&state.level, level)
}

/// Level the logger was started with, if any.
pub fn active_level() -> Option<&'static str> {
    LOGGER.get().map(|state| state.level.as_str())
}

fn check_same_level(active: &str, requested: &str) -> Result<()> {
    if active == requested {
        Ok(())
    } else {
        Err(Error::Logging(format!(
            "logging already initialized with level `{active}`; refusing to switch to `{requested}`"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_rejects_level_change() {
        assert!(init_logging("").is_err());
        init_logging("debug").unwrap();
        init_logging("debug").unwrap();
        assert_eq!(active_level(), Some("debug"));
        assert!(matches!(init_logging("warn"), Err(Error::Logging(_))));
    }
}
