//! Hardware probes: CPU, memory, GPU, battery, firmware, temperatures

use crate::firmware;
use crate::util::{bytes_to_gb, exec, format_duration, percent, read_trimmed};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use sysinfo::{Components, System, MINIMUM_CPU_UPDATE_INTERVAL};
use sysscope_common::model::round2;
use sysscope_common::{
    Fact, FnProbe, Platform, ProbeContext, ProbeFailure, ProbeGroup, Requirement, Value,
};

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";
const PROC_STAT: &str = "/proc/stat";

/// Kernel clock ticks per second for /proc/stat on every mainstream arch
const USER_HZ: f64 = 100.0;

pub fn group(ctx: &ProbeContext) -> ProbeGroup {
    let bios = match ctx.capabilities.platform {
        Platform::Windows => FnProbe::new("BIOS", bios_info).requires(Requirement::Tool("wmic")),
        _ => FnProbe::new("BIOS", bios_info)
            .requires(Requirement::Platform(Platform::Linux))
            .requires(Requirement::Dmi),
    };

    ProbeGroup::new("hardware", ctx)
        .with(FnProbe::new("CPU", cpu_info))
        .with(FnProbe::new("Memory", memory_info))
        .with(FnProbe::new("GPU", gpu_info).requires(Requirement::Tool("nvidia-smi")))
        .with(
            FnProbe::new("Battery", battery_info)
                .requires(Requirement::Platform(Platform::Linux))
                .requires(Requirement::PowerSupply),
        )
        .with(bios)
        .with(FnProbe::new("Temperature", temperature_info))
}

pub fn cpu_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let mut sys = System::new();
    // Usage needs two samples
    sys.refresh_cpu();
    thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();

    let cpus = sys.cpus();
    if cpus.is_empty() {
        return Err(ProbeFailure::runtime("no CPUs reported"));
    }

    let physical: Value = match sys.physical_core_count() {
        Some(n) => n.into(),
        None => "N/A".into(),
    };

    let mut facts = vec![
        Fact::new("CPU Physical Cores", physical),
        Fact::new("CPU Logical Cores", cpus.len()),
        Fact::new("CPU Frequency (MHz)", cpus[0].frequency()),
        Fact::new(
            "CPU Usage (%)",
            round2(sys.global_cpu_info().cpu_usage() as f64),
        ),
    ];

    if ctx.capabilities.platform.is_unix() {
        let load = System::load_average();
        facts.push(Fact::new(
            "CPU Load Average",
            format!("{:.2}, {:.2}, {:.2}", load.one, load.five, load.fifteen),
        ));
    }

    if ctx.capabilities.platform == Platform::Linux {
        if let Some(times) = fs::read_to_string(PROC_STAT).ok().and_then(|s| parse_cpu_times(&s)) {
            facts.extend(times);
        }
    }

    Ok(facts)
}

/// User, system and idle seconds from the aggregate `cpu` line
pub fn parse_cpu_times(stat: &str) -> Option<Vec<Fact>> {
    let line = stat.lines().find(|l| l.split_whitespace().next() == Some("cpu"))?;
    let ticks: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|t| t.parse().unwrap_or(0))
        .collect();
    if ticks.len() < 4 {
        return None;
    }
    let seconds = |t: u64| round2(t as f64 / USER_HZ);
    // user nice system idle ...; nice time is user time
    Some(vec![
        Fact::new("CPU User Time (s)", seconds(ticks[0] + ticks[1])),
        Fact::new("CPU System Time (s)", seconds(ticks[2])),
        Fact::new("CPU Idle Time (s)", seconds(ticks[3])),
    ])
}

pub fn memory_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let mut sys = System::new();
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return Err(ProbeFailure::runtime("memory size not reported"));
    }
    let used = sys.used_memory();
    let total_swap = sys.total_swap();
    let used_swap = sys.used_swap();

    Ok(vec![
        Fact::new("Total Memory (GB)", bytes_to_gb(total)),
        Fact::new("Available Memory (GB)", bytes_to_gb(sys.available_memory())),
        Fact::new("Used Memory (GB)", bytes_to_gb(used)),
        Fact::new("Memory Usage (%)", percent(used, total)),
        Fact::new("Total Swap (GB)", bytes_to_gb(total_swap)),
        Fact::new("Used Swap (GB)", bytes_to_gb(used_swap)),
        Fact::new("Free Swap (GB)", bytes_to_gb(sys.free_swap())),
        Fact::new("Swap Usage (%)", percent(used_swap, total_swap)),
    ])
}

pub fn gpu_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let out = exec(ctx).stdout(
        "nvidia-smi",
        &[
            "--query-gpu=name,memory.total,memory.used,memory.free,utilization.gpu,temperature.gpu",
            "--format=csv,noheader,nounits",
        ],
    )?;
    Ok(parse_nvidia_smi(&out))
}

/// One CSV row per GPU; memory columns are MiB
pub fn parse_nvidia_smi(output: &str) -> Vec<Fact> {
    let mib_to_gb = |field: &str| field.parse::<f64>().map(|mib| round2(mib / 1024.0)).ok();
    let number = |field: &str| field.parse::<f64>().map(round2).ok();

    let mut facts = Vec::new();
    let rows = output.lines().map(str::trim).filter(|l| !l.is_empty());
    for (i, row) in rows.enumerate() {
        let cols: Vec<&str> = row.split(',').map(str::trim).collect();
        if cols.len() < 6 {
            continue;
        }
        let n = i + 1;
        facts.push(Fact::new(format!("GPU {} Name", n), cols[0]));
        let numeric = [
            (format!("GPU {} Memory Total (GB)", n), mib_to_gb(cols[1])),
            (format!("GPU {} Memory Used (GB)", n), mib_to_gb(cols[2])),
            (format!("GPU {} Memory Free (GB)", n), mib_to_gb(cols[3])),
            (format!("GPU {} Usage (%)", n), number(cols[4])),
            (format!("GPU {} Temperature (°C)", n), number(cols[5])),
        ];
        for (key, value) in numeric {
            let value: Value = match value {
                Some(v) => v.into(),
                None => "N/A".into(),
            };
            facts.push(Fact::new(key, value));
        }
    }

    if facts.is_empty() {
        facts.push(Fact::new("GPU", "No GPU detected"));
    }
    facts
}

pub fn battery_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    battery_from_sysfs(Path::new(POWER_SUPPLY_DIR))
}

pub fn battery_from_sysfs(dir: &Path) -> Result<Vec<Fact>, ProbeFailure> {
    let mut supplies: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    supplies.sort();

    let kind = |p: &PathBuf| read_trimmed(p.join("type")).unwrap_or_default();
    let battery = supplies.iter().find(|p| kind(p) == "Battery");
    let mains_online = supplies
        .iter()
        .filter(|p| kind(p) == "Mains")
        .any(|p| read_trimmed(p.join("online")).as_deref() == Some("1"));

    let battery = match battery {
        Some(b) => b,
        None => return Ok(vec![Fact::new("Battery", "N/A (Desktop)")]),
    };

    let capacity: Value = match read_trimmed(battery.join("capacity")).and_then(|c| c.parse::<i64>().ok()) {
        Some(pct) => pct.into(),
        None => "Unknown".into(),
    };
    let status = read_trimmed(battery.join("status")).unwrap_or_default();
    let plugged_in = mains_online || matches!(status.as_str(), "Charging" | "Full");

    let time_left = if status == "Discharging" {
        seconds_left(battery)
            .map(format_duration)
            .unwrap_or_else(|| "Calculating...".to_string())
    } else {
        "Calculating...".to_string()
    };

    Ok(vec![
        Fact::new("Battery Percentage (%)", capacity),
        Fact::new("Battery Plugged In", plugged_in),
        Fact::new("Battery Time Left", time_left),
    ])
}

/// Remaining runtime from energy (µWh/µW) or charge (µAh/µA) counters
fn seconds_left(battery: &Path) -> Option<u64> {
    let read_u64 = |name: &str| read_trimmed(battery.join(name)).and_then(|v| v.parse::<u64>().ok());
    let (remaining, rate) = match (read_u64("energy_now"), read_u64("power_now")) {
        (Some(e), Some(p)) => (e, p),
        _ => (read_u64("charge_now")?, read_u64("current_now")?),
    };
    if rate == 0 {
        return None;
    }
    Some(remaining * 3_600 / rate)
}

pub fn bios_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let id = firmware::read(ctx)?;
    if id.is_empty() {
        return Err(ProbeFailure::runtime("firmware identity is empty"));
    }
    let text = |v: Option<String>| v.unwrap_or_else(|| "Unknown".to_string());

    Ok(vec![
        Fact::new("BIOS Manufacturer", text(id.bios_vendor)),
        Fact::new("BIOS Firmware Version", text(id.bios_version)),
        Fact::new("BIOS Firmware Date", text(id.bios_date)),
        Fact::new("System Manufacturer", text(id.system_vendor)),
        Fact::new("System Model", text(id.system_model)),
    ])
}

pub fn temperature_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let components = Components::new_with_refreshed_list();
    let readings = sensor_readings(
        components
            .list()
            .iter()
            .filter(|c| c.temperature().is_finite())
            .map(|c| (c.label().to_string(), c.temperature() as f64)),
    );

    if readings.is_empty() {
        return Err(ProbeFailure::unsupported("no temperature sensors exposed"));
    }
    Ok(vec![Fact::group("Temperatures (°C)", readings)])
}

/// Sensors often share a label ("Composite" per NVMe drive); repeats get
/// a counter so every reading survives in the group
pub fn sensor_readings(readings: impl IntoIterator<Item = (String, f64)>) -> Vec<Fact> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    readings
        .into_iter()
        .map(|(label, celsius)| {
            let count = seen.entry(label.clone()).or_insert(0);
            *count += 1;
            let key = if *count == 1 {
                label
            } else {
                format!("{} ({})", label, count)
            };
            Fact::new(key, round2(celsius))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_sensor_labels_get_counter() {
        let facts = sensor_readings(vec![
            ("Composite".to_string(), 41.0),
            ("Package id 0".to_string(), 55.5),
            ("Composite".to_string(), 38.0),
            ("Composite".to_string(), 39.25),
        ]);
        let keys: Vec<&str> = facts.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["Composite", "Package id 0", "Composite (2)", "Composite (3)"]);
        assert_eq!(facts[2], Fact::new("Composite (2)", 38.0));
    }

    #[test]
    fn test_parse_cpu_times() {
        let stat = "cpu  10000 500 2500 80000 300 0 20 0 0 0\ncpu0 5000 250 1250 40000 150 0 10 0 0 0\nintr 1\n";
        let facts = parse_cpu_times(stat).unwrap();
        assert_eq!(facts[0], Fact::new("CPU User Time (s)", 105.0));
        assert_eq!(facts[1], Fact::new("CPU System Time (s)", 25.0));
        assert_eq!(facts[2], Fact::new("CPU Idle Time (s)", 800.0));
    }

    #[test]
    fn test_parse_cpu_times_needs_aggregate_line() {
        assert!(parse_cpu_times("cpu0 1 2 3 4\n").is_none());
        assert!(parse_cpu_times("cpu 1 2\n").is_none());
    }

    #[test]
    fn test_parse_nvidia_smi() {
        let out = "NVIDIA GeForce RTX 3070, 8192, 1024, 7168, 12, 48\n";
        let facts = parse_nvidia_smi(out);
        assert_eq!(facts[0], Fact::new("GPU 1 Name", "NVIDIA GeForce RTX 3070"));
        assert_eq!(facts[1], Fact::new("GPU 1 Memory Total (GB)", 8.0));
        assert_eq!(facts[3], Fact::new("GPU 1 Memory Free (GB)", 7.0));
        assert_eq!(facts[5], Fact::new("GPU 1 Temperature (°C)", 48.0));
    }

    #[test]
    fn test_parse_nvidia_smi_unsupported_fields() {
        let out = "Tesla T4, 15360, [N/A], [N/A], 0, 35\nTesla T4, 15360, 0, 15360, 0, 36\n";
        let facts = parse_nvidia_smi(out);
        assert_eq!(facts.len(), 12);
        assert_eq!(facts[2].value.as_text(), Some("N/A"));
        assert_eq!(facts[6].key, "GPU 2 Name");
    }

    #[test]
    fn test_no_gpu_rows() {
        assert_eq!(parse_nvidia_smi(""), vec![Fact::new("GPU", "No GPU detected")]);
    }

    fn supply(root: &Path, name: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            fs::write(dir.join(file), format!("{}\n", content)).unwrap();
        }
    }

    #[test]
    fn test_battery_discharging() {
        let root = tempfile::tempdir().unwrap();
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "0")]);
        supply(
            root.path(),
            "BAT0",
            &[
                ("type", "Battery"),
                ("capacity", "81"),
                ("status", "Discharging"),
                ("energy_now", "30000000"),
                ("power_now", "10000000"),
            ],
        );

        let facts = battery_from_sysfs(root.path()).unwrap();
        assert_eq!(facts[0], Fact::new("Battery Percentage (%)", 81i64));
        assert_eq!(facts[1], Fact::new("Battery Plugged In", false));
        assert_eq!(facts[2], Fact::new("Battery Time Left", "3:00:00"));
    }

    #[test]
    fn test_battery_charging_is_calculating() {
        let root = tempfile::tempdir().unwrap();
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "1")]);
        supply(
            root.path(),
            "BAT0",
            &[("type", "Battery"), ("capacity", "40"), ("status", "Charging")],
        );

        let facts = battery_from_sysfs(root.path()).unwrap();
        assert_eq!(facts[1], Fact::new("Battery Plugged In", true));
        assert_eq!(facts[2], Fact::new("Battery Time Left", "Calculating..."));
    }

    #[test]
    fn test_desktop_without_battery() {
        let root = tempfile::tempdir().unwrap();
        supply(root.path(), "AC", &[("type", "Mains"), ("online", "1")]);
        let facts = battery_from_sysfs(root.path()).unwrap();
        assert_eq!(facts, vec![Fact::new("Battery", "N/A (Desktop)")]);
    }
}
