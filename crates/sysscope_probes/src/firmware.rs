//! Firmware identity: DMI on Linux, wmic on Windows.
//!
//! Shared by the BIOS probe and the VM probe.

use crate::util::{exec, read_trimmed};
use std::collections::HashMap;
use std::path::Path;
use sysscope_common::{Platform, ProbeContext, ProbeFailure};

const DMI_DIR: &str = "/sys/class/dmi/id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareIdentity {
    pub bios_vendor: Option<String>,
    pub bios_version: Option<String>,
    pub bios_date: Option<String>,
    pub system_vendor: Option<String>,
    pub system_model: Option<String>,
}

impl FirmwareIdentity {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Read firmware identity for the current platform
pub fn read(ctx: &ProbeContext) -> Result<FirmwareIdentity, ProbeFailure> {
    let caps = &ctx.capabilities;
    match caps.platform {
        Platform::Linux if caps.dmi => Ok(read_dmi(Path::new(DMI_DIR))),
        Platform::Linux => Err(ProbeFailure::missing("firmware information not readable")),
        Platform::Windows if caps.has_tool("wmic") => read_wmic(ctx),
        Platform::Windows => Err(ProbeFailure::missing("wmic not found")),
        other => Err(ProbeFailure::unsupported(format!(
            "firmware identity not implemented on {}",
            other.as_str()
        ))),
    }
}

pub fn read_dmi(dir: &Path) -> FirmwareIdentity {
    FirmwareIdentity {
        bios_vendor: read_trimmed(dir.join("bios_vendor")),
        bios_version: read_trimmed(dir.join("bios_version")),
        bios_date: read_trimmed(dir.join("bios_date")),
        system_vendor: read_trimmed(dir.join("sys_vendor")),
        system_model: read_trimmed(dir.join("product_name")),
    }
}

fn read_wmic(ctx: &ProbeContext) -> Result<FirmwareIdentity, ProbeFailure> {
    let runner = exec(ctx);
    let bios = parse_wmic_values(&runner.stdout(
        "wmic",
        &["bios", "get", "Manufacturer,SMBIOSBIOSVersion,ReleaseDate", "/value"],
    )?);
    // The system half is optional; BIOS data alone is still useful
    let system = runner
        .stdout("wmic", &["computersystem", "get", "Manufacturer,Model", "/value"])
        .map(|out| parse_wmic_values(&out))
        .unwrap_or_default();

    Ok(FirmwareIdentity {
        bios_vendor: bios.get("Manufacturer").cloned(),
        bios_version: bios.get("SMBIOSBIOSVersion").cloned(),
        bios_date: bios.get("ReleaseDate").map(|d| format_wmi_date(d)),
        system_vendor: system.get("Manufacturer").cloned(),
        system_model: system.get("Model").cloned(),
    })
}

/// `Key=Value` lines from `wmic ... /value`, empty values dropped
pub fn parse_wmic_values(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(_, v)| !v.is_empty())
        .collect()
}

/// `20230115000000.000000+000` → `2023-01-15`
pub fn format_wmi_date(raw: &str) -> String {
    let digits: String = raw.chars().take(8).collect();
    if digits.len() == 8 && digits.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &digits[..4], &digits[4..6], &digits[6..8])
    } else {
        raw.to_string()
    }
}
