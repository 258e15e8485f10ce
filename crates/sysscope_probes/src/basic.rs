//! Identity probes: OS, locale, users, boot and the VM verdict

use crate::firmware;
use crate::util::{exec, format_duration, read_trimmed};
use chrono::{Local, TimeZone};
use std::env;
use std::fs;
use std::path::Path;
use sysinfo::System;
use sysscope_common::{
    Fact, FnProbe, Probe, ProbeContext, ProbeFailure, ProbeGroup, VmDetector, VmEvidence,
};
use tracing::debug;

pub fn group(ctx: &ProbeContext) -> ProbeGroup {
    ProbeGroup::new("basic", ctx)
        .with(FnProbe::new("OS Name", os_info))
        .with(FnProbe::new("Locale", locale_info))
        .with(FnProbe::new("Current User", users_info))
        .with(FnProbe::new("Boot Time", boot_info))
        .with(VmProbe::default())
}

fn or_unknown(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn os_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let mut sys = System::new();
    sys.refresh_cpu();
    let processor = sys.cpus().first().map(|cpu| cpu.brand().to_string());

    Ok(vec![
        Fact::new("OS Name", or_unknown(System::name())),
        Fact::new("OS Version", or_unknown(System::os_version())),
        Fact::new("OS Release", or_unknown(System::kernel_version())),
        Fact::new("OS Platform", or_unknown(System::long_os_version())),
        Fact::new("Architecture", env::consts::ARCH),
        Fact::new("Processor", or_unknown(processor)),
    ])
}

pub fn locale_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|v| !v.is_empty());

    let (name, encoding) = match locale.as_deref() {
        Some(raw) => split_locale(raw),
        None => ("Unknown".to_string(), "Unknown".to_string()),
    };

    Ok(vec![
        Fact::new("System Locale", name),
        Fact::new("System Encoding", encoding),
        Fact::new("Timezone", timezone()),
    ])
}

/// `en_US.UTF-8@euro` → (`en_US`, `UTF-8`)
pub fn split_locale(raw: &str) -> (String, String) {
    let without_modifier = raw.split('@').next().unwrap_or(raw);
    match without_modifier.split_once('.') {
        Some((name, encoding)) => (name.to_string(), encoding.to_string()),
        None => (without_modifier.to_string(), "Unknown".to_string()),
    }
}

fn timezone() -> String {
    if let Some(tz) = env::var("TZ").ok().filter(|v| !v.is_empty()) {
        return tz.trim_start_matches(':').to_string();
    }
    if let Some(tz) = read_trimmed("/etc/timezone") {
        return tz;
    }
    if let Some(tz) = fs::read_link("/etc/localtime")
        .ok()
        .and_then(|target| zone_from_localtime(&target))
    {
        return tz;
    }
    Local::now().format("UTC%:z").to_string()
}

/// `/usr/share/zoneinfo/Europe/Madrid` → `Europe/Madrid`
pub fn zone_from_localtime(target: &Path) -> Option<String> {
    let text = target.to_string_lossy();
    text.split_once("zoneinfo/").map(|(_, zone)| zone.to_string())
}

pub fn users_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let current = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "Unknown".to_string());

    let logged_in = logged_in_users(ctx, || exec(ctx).stdout("who", &[]), account_names);

    let logged_in = if logged_in.is_empty() {
        "None".to_string()
    } else {
        logged_in.join(", ")
    };

    Ok(vec![
        Fact::new("Current User", current),
        Fact::new("Logged-in Users", logged_in),
    ])
}

/// Session owners from `who` when it was detected, else the account list
fn logged_in_users(
    ctx: &ProbeContext,
    who: impl FnOnce() -> Result<String, ProbeFailure>,
    accounts: impl FnOnce() -> Vec<String>,
) -> Vec<String> {
    if !ctx.capabilities.has_tool("who") {
        return accounts();
    }
    match who() {
        Ok(out) => parse_who(&out),
        Err(e) => {
            debug!("who failed: {}", e);
            accounts()
        }
    }
}

/// Distinct user names from `who`, in first-seen order
pub fn parse_who(output: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in output.lines().filter_map(|l| l.split_whitespace().next()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn account_names() -> Vec<String> {
    let users = sysinfo::Users::new_with_refreshed_list();
    users.list().iter().map(|u| u.name().to_string()).collect()
}

pub fn boot_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let boot = System::boot_time();
    if boot == 0 {
        return Err(ProbeFailure::runtime("boot time not reported"));
    }
    let boot_secs = i64::try_from(boot).map_err(|e| ProbeFailure::runtime(e.to_string()))?;
    let boot_time = Local
        .timestamp_opt(boot_secs, 0)
        .single()
        .ok_or_else(|| ProbeFailure::runtime(format!("invalid boot timestamp {}", boot)))?;

    Ok(vec![
        Fact::new("Boot Time", boot_time.format("%Y-%m-%d %H:%M:%S").to_string()),
        Fact::new("Uptime", format_duration(System::uptime())),
    ])
}

/// Runs the VM detector over firmware identity and running processes
pub struct VmProbe {
    detector: VmDetector,
}

impl Default for VmProbe {
    fn default() -> Self {
        Self {
            detector: VmDetector::with_default_signals(),
        }
    }
}

impl Probe for VmProbe {
    fn label(&self) -> &str {
        "Virtual Machine"
    }

    fn collect(&self, ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
        // Missing firmware data just leaves those signals without input
        let firmware = firmware::read(ctx).unwrap_or_else(|e| {
            debug!("VM probe without firmware identity: {}", e);
            firmware::FirmwareIdentity::default()
        });

        let mut sys = System::new();
        sys.refresh_processes();
        let processes: Vec<String> = sys
            .processes()
            .values()
            .map(|p| p.name().to_string())
            .collect();

        let mut evidence = VmEvidence {
            bios_manufacturer: firmware.bios_vendor,
            system_manufacturer: firmware.system_vendor,
            system_model: firmware.system_model,
            processes: None,
        };
        if !processes.is_empty() {
            evidence = evidence.with_processes(processes);
        }

        Ok(self.detector.evaluate(&evidence).to_facts())
    }
}
