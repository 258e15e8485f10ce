//! sysscope Probes - the concrete probe catalogue
//!
//! Six groups, run in this order: basic, hardware, storage, network,
//! security, software. Each probe reads the host through `sysinfo`,
//! sysfs/procfs or a short-lived subprocess, and declares its platform and
//! tool requirements so ineligible probes are skipped without running.

pub mod basic;
pub mod firmware;
pub mod hardware;
pub mod network;
pub mod security;
pub mod software;
pub mod storage;
mod util;

use sysscope_common::{ProbeContext, ProbeGroup};

/// The full catalogue, in display order
pub fn default_groups(ctx: &ProbeContext) -> Vec<ProbeGroup> {
    vec![
        basic::group(ctx),
        hardware::group(ctx),
        storage::group(ctx),
        network::group(ctx),
        security::group(ctx),
        software::group(ctx),
    ]
}
