//! Exit codes for sysscope
//!
//! Values follow sysexits(3) where one applies.

use sysscope_common::{ConfigError, SinkError};

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code for bad command-line usage (what clap uses)
pub const EXIT_USAGE: i32 = 2;

/// Exit code when the report could not be written (EX_IOERR)
pub const EXIT_IO_ERROR: i32 = 74;

/// Exit code for an unreadable or invalid configuration (EX_CONFIG)
pub const EXIT_CONFIG_ERROR: i32 = 78;

/// Pick the exit code for a top-level error by looking through its chain
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return EXIT_CONFIG_ERROR;
        }
        if cause.downcast_ref::<SinkError>().is_some() {
            return EXIT_IO_ERROR;
        }
    }
    EXIT_GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_errors_map_to_ex_config() {
        let err: anyhow::Error = ConfigError::invalid("report.page_lines", "must be at least 10").into();
        assert_eq!(exit_code_for(&err), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_context_does_not_hide_sink_errors() {
        let result: Result<(), SinkError> = Err(SinkError::Finished);
        let err = result.context("writing report").unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_IO_ERROR);
    }

    #[test]
    fn test_anything_else_is_general() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(exit_code_for(&err), EXIT_GENERAL_ERROR);
    }
}
