//! Storage probes: root disk usage and the partition list

use crate::util::{bytes_to_gb, bytes_to_mb, percent};
use std::fs;
use std::path::Path;
use sysinfo::Disks;
use sysscope_common::{
    Fact, FnProbe, Platform, ProbeContext, ProbeFailure, ProbeGroup, Requirement,
};

const DISKSTATS: &str = "/proc/diskstats";
const SYS_BLOCK_DIR: &str = "/sys/block";

/// /proc/diskstats counts in 512-byte sectors regardless of the device
const SECTOR_BYTES: u64 = 512;

pub fn group(ctx: &ProbeContext) -> ProbeGroup {
    ProbeGroup::new("storage", ctx)
        .with(FnProbe::new("Disk", disk_info))
        .with(FnProbe::new("Disk I/O", disk_io_info).requires(Requirement::Platform(Platform::Linux)))
        .with(FnProbe::new("Disk Partitions", partitions_info))
}

/// Plain view of a mounted disk, decoupled from sysinfo for testing
#[derive(Debug, Clone, PartialEq)]
pub struct MountInfo {
    pub device: String,
    pub mount: String,
    pub fs_type: String,
    pub total: u64,
    pub available: u64,
}

fn mounts() -> Vec<MountInfo> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .map(|d| MountInfo {
            device: d.name().to_string_lossy().to_string(),
            mount: d.mount_point().to_string_lossy().to_string(),
            fs_type: d.file_system().to_string_lossy().to_string(),
            total: d.total_space(),
            available: d.available_space(),
        })
        .collect()
}

/// The system root (`/` or `C:\`), else the first mount
pub fn pick_root(mounts: &[MountInfo]) -> Option<&MountInfo> {
    mounts
        .iter()
        .find(|m| Path::new(&m.mount) == Path::new("/"))
        .or_else(|| mounts.iter().find(|m| m.mount.eq_ignore_ascii_case("C:\\")))
        .or_else(|| mounts.first())
}

pub fn disk_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let mounts = mounts();
    let root = pick_root(&mounts).ok_or_else(|| ProbeFailure::runtime("no mounted disks reported"))?;
    Ok(disk_facts(root))
}

pub fn disk_facts(root: &MountInfo) -> Vec<Fact> {
    let used = root.total.saturating_sub(root.available);
    vec![
        Fact::new("Total Disk Space (GB)", bytes_to_gb(root.total)),
        Fact::new("Used Disk Space (GB)", bytes_to_gb(used)),
        Fact::new("Free Disk Space (GB)", bytes_to_gb(root.available)),
        Fact::new("Disk Usage (%)", percent(used, root.total)),
    ]
}

/// Cumulative bytes moved since boot across whole disks
pub fn disk_io_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let stats = fs::read_to_string(DISKSTATS)
        .map_err(|e| ProbeFailure::runtime(format!("{}: {}", DISKSTATS, e)))?;
    let (read, written) = sum_diskstats(&stats, |name| Path::new(SYS_BLOCK_DIR).join(name).exists());
    Ok(vec![
        Fact::new("Disk Read (MB)", bytes_to_mb(read)),
        Fact::new("Disk Write (MB)", bytes_to_mb(written)),
    ])
}

/// Sum (read, written) bytes over the devices `is_disk` accepts.
/// Partitions would double count, loop and ram devices are not storage.
pub fn sum_diskstats(stats: &str, is_disk: impl Fn(&str) -> bool) -> (u64, u64) {
    let mut read = 0u64;
    let mut written = 0u64;
    for line in stats.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[2];
        if name.starts_with("loop") || name.starts_with("ram") || !is_disk(name) {
            continue;
        }
        let sectors = |i: usize| fields[i].parse::<u64>().unwrap_or(0);
        read = read.saturating_add(sectors(5).saturating_mul(SECTOR_BYTES));
        written = written.saturating_add(sectors(9).saturating_mul(SECTOR_BYTES));
    }
    (read, written)
}

pub fn partitions_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    Ok(partition_facts(&mounts(), ctx.config.probes.max_partitions))
}

pub fn partition_facts(mounts: &[MountInfo], limit: usize) -> Vec<Fact> {
    if mounts.is_empty() {
        return vec![Fact::new("Disk Partitions", "None found")];
    }

    let mut facts = vec![Fact::new("Disk Partitions Count", mounts.len())];
    for (i, m) in mounts.iter().take(limit).enumerate() {
        let n = i + 1;
        facts.push(Fact::new(format!("Partition {} Device", n), m.device.as_str()));
        facts.push(Fact::new(format!("Partition {} Mount", n), m.mount.as_str()));
        facts.push(Fact::new(format!("Partition {} Type", n), m.fs_type.as_str()));
        facts.push(Fact::new(format!("Partition {} Total (GB)", n), bytes_to_gb(m.total)));
        facts.push(Fact::new(format!("Partition {} Free (GB)", n), bytes_to_gb(m.available)));
    }
    facts
}
