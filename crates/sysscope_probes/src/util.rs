//! Small helpers shared by the probe modules

use std::fs;
use std::path::Path;
use sysscope_common::command_exec::CommandExec;
use sysscope_common::model::round2;
use sysscope_common::{ProbeContext, ProbeFailure};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / GIB)
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / MIB)
}

/// `part / whole` as a percentage, 0 when `whole` is 0
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

/// Command runner bounded by the configured command timeout
pub fn exec(ctx: &ProbeContext) -> CommandExec {
    CommandExec::from_millis(ctx.config.collection.command_timeout_ms)
}

/// Trimmed file content, `None` if unreadable or empty
pub fn read_trimmed(path: impl AsRef<Path>) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Like `read_trimmed` but with a failure suitable for `?`
pub fn read_required(path: impl AsRef<Path>) -> Result<String, ProbeFailure> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    Ok(content.trim().to_string())
}

/// `H:MM:SS`, or `N day(s), H:MM:SS` past 24 hours
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let secs = total_secs % 60;
    let clock = format!("{}:{:02}:{:02}", hours, minutes, secs);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(bytes_to_gb(16 * 1024 * 1024 * 1024), 16.0);
        assert_eq!(bytes_to_gb(1_610_612_736), 1.5);
        assert_eq!(bytes_to_mb(5 * 1024 * 1024 + 512 * 1024), 5.5);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59), "0:00:59");
        assert_eq!(format_duration(3_723), "1:02:03");
        assert_eq!(format_duration(86_400 + 61), "1 day, 0:01:01");
        assert_eq!(format_duration(3 * 86_400 + 7_200), "3 days, 2:00:00");
    }
}
