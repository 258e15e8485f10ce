//! Security posture probes
//!
//! Windows reads Defender/firewall/UAC state through powershell, netsh and
//! reg. Linux reports the active firewall front-end, the loaded security
//! module and the number of pending package updates.

use crate::util::{exec, read_trimmed};
use std::path::Path;
use sysscope_common::command_exec::ExecutionStatus;
use sysscope_common::{Fact, FnProbe, Platform, ProbeContext, ProbeFailure, ProbeGroup, Requirement};
use tracing::debug;

const FIREWALL_TOOLS: &[&str] = &["ufw", "firewall-cmd", "nft"];
const UPDATE_TOOLS: &[&str] = &["checkupdates", "apt", "dnf"];

const UAC_KEY: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Policies\System";

pub fn group(ctx: &ProbeContext) -> ProbeGroup {
    ProbeGroup::new("security", ctx)
        .with(
            FnProbe::new("Windows Security", windows_security)
                .requires(Requirement::Platform(Platform::Windows))
                .requires(Requirement::Tool("powershell")),
        )
        .with(
            FnProbe::new("Firewall", linux_firewall)
                .requires(Requirement::Platform(Platform::Linux))
                .requires(Requirement::AnyTool(FIREWALL_TOOLS)),
        )
        .with(
            FnProbe::new("Security Modules", security_modules)
                .requires(Requirement::Platform(Platform::Linux)),
        )
        .with(FnProbe::new("Pending Updates", pending_updates).requires(Requirement::AnyTool(UPDATE_TOOLS)))
}

pub fn windows_security(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let runner = exec(ctx);
    let unknown = || "Unable to determine".to_string();

    let defender = runner
        .stdout(
            "powershell",
            &[
                "-NoProfile",
                "-Command",
                "(Get-MpComputerStatus).AntivirusEnabled",
            ],
        )
        .map(|out| match out.trim() {
            "True" => "Enabled".to_string(),
            "False" => "Disabled".to_string(),
            other => other.to_string(),
        })
        .unwrap_or_else(|e| {
            debug!("Defender query failed: {}", e);
            unknown()
        });

    let firewall = runner
        .stdout("netsh", &["advfirewall", "show", "allprofiles", "state"])
        .map(|out| yes_no(parse_netsh_firewall(&out)))
        .unwrap_or_else(|_| unknown());

    let uac = runner
        .stdout("reg", &["query", UAC_KEY, "/v", "EnableLUA"])
        .ok()
        .and_then(|out| parse_reg_dword(&out, "EnableLUA"))
        .map(|v| yes_no(v != 0))
        .unwrap_or_else(unknown);

    Ok(vec![
        Fact::new("Windows Defender", defender),
        Fact::new("Firewall Enabled", firewall),
        Fact::new("UAC Enabled", uac),
    ])
}

fn yes_no(b: bool) -> String {
    if b { "Yes" } else { "No" }.to_string()
}

/// True when any profile reports `State ON`
pub fn parse_netsh_firewall(output: &str) -> bool {
    output.lines().any(|line| {
        let mut parts = line.split_whitespace();
        parts.next() == Some("State") && parts.next().map(|s| s.eq_ignore_ascii_case("on")) == Some(true)
    })
}

/// `EnableLUA    REG_DWORD    0x1` → 1
pub fn parse_reg_dword(output: &str, name: &str) -> Option<u32> {
    output.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [n, "REG_DWORD", value] if *n == name => {
                u32::from_str_radix(value.trim_start_matches("0x"), 16).ok()
            }
            _ => None,
        }
    })
}

pub fn linux_firewall(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let runner = exec(ctx);
    let caps = &ctx.capabilities;
    let mut last_error = ProbeFailure::missing(format!("none of {} found", FIREWALL_TOOLS.join(", ")));

    if caps.has_tool("ufw") {
        match runner.stdout("ufw", &["status"]) {
            Ok(out) => return Ok(vec![Fact::new("Firewall", format!("ufw: {}", parse_ufw_status(&out)))]),
            Err(e) => last_error = e,
        }
    }
    if caps.has_tool("firewall-cmd") {
        // `--state` exits non-zero when the daemon is stopped
        let result = runner.execute("firewall-cmd", &["--state"]);
        match result.status {
            ExecutionStatus::Success | ExecutionStatus::NonZeroExit => {
                let state = result.stdout.trim();
                let state = if state.is_empty() { "not running" } else { state };
                return Ok(vec![Fact::new("Firewall", format!("firewalld: {}", state))]);
            }
            _ => last_error = result.into_stdout().err().unwrap_or(last_error),
        }
    }
    if caps.has_tool("nft") {
        match runner.stdout("nft", &["list", "ruleset"]) {
            Ok(out) => {
                let state = if out.trim().is_empty() { "no rules loaded" } else { "rules loaded" };
                return Ok(vec![Fact::new("Firewall", format!("nftables: {}", state))]);
            }
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// `Status: active` → `active`
pub fn parse_ufw_status(output: &str) -> String {
    output
        .lines()
        .find_map(|l| l.trim().strip_prefix("Status:"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn security_modules(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    Ok(vec![Fact::new("Security Modules", detect_security_modules(Path::new("/sys")))])
}

/// SELinux enforce state and AppArmor enabled flag under a sysfs root
pub fn detect_security_modules(sysfs: &Path) -> String {
    let mut found = Vec::new();

    match read_trimmed(sysfs.join("fs/selinux/enforce")).as_deref() {
        Some("1") => found.push("SELinux (enforcing)".to_string()),
        Some("0") => found.push("SELinux (permissive)".to_string()),
        _ => {}
    }
    if read_trimmed(sysfs.join("module/apparmor/parameters/enabled")).as_deref() == Some("Y") {
        found.push("AppArmor (enabled)".to_string());
    }

    if found.is_empty() {
        "None detected".to_string()
    } else {
        found.join(", ")
    }
}

pub fn pending_updates(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let runner = exec(ctx);
    let caps = &ctx.capabilities;

    let count = if caps.has_tool("checkupdates") {
        // exit 2 means "no updates"
        let result = runner.execute("checkupdates", &[]);
        match (result.status, result.exit_code) {
            (ExecutionStatus::Success, _) => count_lines(&result.stdout),
            (ExecutionStatus::NonZeroExit, 2) => 0,
            _ => return Err(result.into_stdout().err().unwrap_or_else(|| ProbeFailure::runtime("checkupdates failed"))),
        }
    } else if caps.has_tool("apt") {
        let out = runner.stdout("apt", &["list", "--upgradable"])?;
        count_apt_upgradable(&out)
    } else if caps.has_tool("dnf") {
        // exit 100 means "updates available"
        let result = runner.execute("dnf", &["check-update", "-q", "--cacheonly"]);
        match (result.status, result.exit_code) {
            (ExecutionStatus::Success, _) => 0,
            (ExecutionStatus::NonZeroExit, 100) => count_dnf_updates(&result.stdout),
            _ => return Err(result.into_stdout().err().unwrap_or_else(|| ProbeFailure::runtime("dnf failed"))),
        }
    } else {
        return Err(ProbeFailure::missing(format!("none of {} found", UPDATE_TOOLS.join(", "))));
    };

    Ok(vec![Fact::new("Pending Updates", count)])
}

fn count_lines(output: &str) -> usize {
    output.lines().filter(|l| !l.trim().is_empty()).count()
}

/// Skips the `Listing...` banner
pub fn count_apt_upgradable(output: &str) -> usize {
    output
        .lines()
        .filter(|l| l.contains("[upgradable from"))
        .count()
}

/// Package rows only; section headers like `Obsoleting Packages` stop the count
pub fn count_dnf_updates(output: &str) -> usize {
    output
        .lines()
        .take_while(|l| !l.starts_with("Obsoleting"))
        .filter(|l| l.split_whitespace().count() == 3)
        .count()
}
