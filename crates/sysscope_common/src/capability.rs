//! Capability detection - what this host can tell us
//!
//! Detected once at startup and threaded into probe registration so that
//! eligibility is a table lookup, not a scattered set of platform checks.

use serde::Serialize;
use std::collections::BTreeSet;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Optional external tools probes may depend on
pub const KNOWN_TOOLS: &[&str] = &[
    "who",
    "nvidia-smi",
    "wmic",
    "powershell",
    "netsh",
    "reg",
    "nmcli",
    "ip",
    "hostname",
    "ufw",
    "firewall-cmd",
    "nft",
    "python3",
    "python",
    "pacman",
    "checkupdates",
    "dpkg-query",
    "apt",
    "rpm",
    "dnf",
];

const DMI_DIR: &str = "/sys/class/dmi/id";
const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match env::consts::OS {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Other,
        }
    }

    pub fn is_unix(&self) -> bool {
        matches!(self, Platform::Linux | Platform::MacOs)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Other => "other",
        }
    }
}

/// Immutable record of the platform and the optional data sources present
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub platform: Platform,
    /// Firmware identity readable from sysfs
    pub dmi: bool,
    /// Battery / AC state readable from sysfs
    pub power_supply: bool,
    /// Subset of `KNOWN_TOOLS` found on PATH
    pub tools: BTreeSet<String>,
}

impl CapabilitySet {
    /// Inspect the host. Called once per process.
    pub fn detect() -> Self {
        let platform = Platform::current();
        let tools = tools_on_path(env::var_os("PATH"));

        let caps = Self {
            platform,
            dmi: platform == Platform::Linux && Path::new(DMI_DIR).is_dir(),
            power_supply: platform == Platform::Linux && Path::new(POWER_SUPPLY_DIR).is_dir(),
            tools,
        };

        debug!(
            "Capabilities: platform={} dmi={} power_supply={} tools={:?}",
            caps.platform.as_str(),
            caps.dmi,
            caps.power_supply,
            caps.tools
        );

        caps
    }

    /// A bare capability set with no optional sources (useful in tests)
    pub fn minimal(platform: Platform) -> Self {
        Self {
            platform,
            dmi: false,
            power_supply: false,
            tools: BTreeSet::new(),
        }
    }

    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tools.insert(tool.to_string());
        self
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }
}

/// Which of `KNOWN_TOOLS` resolve against a PATH-style search list
fn tools_on_path(paths: Option<OsString>) -> BTreeSet<String> {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    KNOWN_TOOLS
        .iter()
        .filter(|tool| which::which_in(tool, paths.clone(), &cwd).is_ok())
        .map(|tool| tool.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_matches_build_target() {
        let platform = Platform::current();
        if cfg!(target_os = "linux") {
            assert_eq!(platform, Platform::Linux);
        }
        if cfg!(target_os = "windows") {
            assert_eq!(platform, Platform::Windows);
        }
    }

    #[test]
    fn test_detect_only_reports_known_tools() {
        let caps = CapabilitySet::detect();
        for tool in &caps.tools {
            assert!(KNOWN_TOOLS.contains(&tool.as_str()));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_tools_found_only_on_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let nmcli = dir.path().join("nmcli");
        std::fs::write(&nmcli, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&nmcli, std::fs::Permissions::from_mode(0o755)).unwrap();
        // present but not executable
        std::fs::write(dir.path().join("ufw"), "").unwrap();

        let tools = tools_on_path(Some(dir.path().as_os_str().to_owned()));
        assert!(tools.contains("nmcli"));
        assert!(!tools.contains("ufw"));
    }

    #[test]
    fn test_minimal_has_nothing_optional() {
        let caps = CapabilitySet::minimal(Platform::Linux).with_tool("ip");
        assert!(!caps.dmi);
        assert!(!caps.power_supply);
        assert!(caps.has_tool("ip"));
        assert!(!caps.has_tool("nvidia-smi"));
    }
}
