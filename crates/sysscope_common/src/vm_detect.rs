//! VM detection - combine weak signals into one verdict
//!
//! No single signal is reliable on its own: firmware strings can be
//! customised, guest tools may not be installed. Any fired signal makes the
//! verdict virtual; signals without data contribute nothing. When no signal
//! had data at all the status is `Unknown` rather than `Physical`.

use crate::model::{Fact, Snapshot, Value};
use crate::probe::ProbeFailure;
use serde::Serialize;
use std::fmt;
use tracing::debug;

pub const BIOS_MANUFACTURER_KEY: &str = "BIOS Manufacturer";
pub const SYSTEM_MANUFACTURER_KEY: &str = "System Manufacturer";
pub const SYSTEM_MODEL_KEY: &str = "System Model";

pub const IS_VM_KEY: &str = "Is Virtual Machine";
pub const INDICATORS_KEY: &str = "Virtual Machine Indicators";

const BIOS_VENDORS: &[&str] = &[
    "vmware",
    "virtualbox",
    "innotek",
    "qemu",
    "xen",
    "bochs",
    "parallels",
    "seabios",
    "kvm",
    "hyper-v",
    "amazon ec2",
    "google",
];

// No "microsoft corporation": physical Surface devices report it
const SYSTEM_VENDORS: &[&str] = &[
    "vmware",
    "innotek",
    "qemu",
    "xen",
    "parallels",
    "red hat",
    "nutanix",
];

const SYSTEM_MODELS: &[&str] = &[
    "virtual machine",
    "virtualbox",
    "vmware",
    "kvm",
    "qemu",
    "hvm domu",
    "bochs",
    "parallels",
    "standard pc",
];

const GUEST_TOOL_PROCESSES: &[&str] = &[
    "vmtoolsd",
    "vmtoolsd.exe",
    "vmwaretray.exe",
    "vmwareuser.exe",
    "vboxservice",
    "vboxservice.exe",
    "vboxtray.exe",
    "vboxclient",
    "qemu-ga",
    "qemu-ga.exe",
    "prl_tools.exe",
    "prl_cc.exe",
    "xenservice.exe",
    "vmsrvc.exe",
    "vmusrvc.exe",
    "spice-vdagent",
    "spice-vdagentd",
];

/// Raw inputs the signals look at. `None` means the source was unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmEvidence {
    pub bios_manufacturer: Option<String>,
    pub system_manufacturer: Option<String>,
    pub system_model: Option<String>,
    pub processes: Option<Vec<String>>,
}

impl VmEvidence {
    /// Firmware identity from already-collected facts. Placeholders and
    /// non-text values count as unavailable.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            bios_manufacturer: usable_text(snapshot.get(BIOS_MANUFACTURER_KEY)),
            system_manufacturer: usable_text(snapshot.get(SYSTEM_MANUFACTURER_KEY)),
            system_model: usable_text(snapshot.get(SYSTEM_MODEL_KEY)),
            processes: None,
        }
    }

    pub fn with_processes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processes = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

fn usable_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_text)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !ProbeFailure::is_placeholder_text(s))
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalReading {
    Fired,
    Quiet,
    /// The signal had no data to look at
    Unavailable,
}

pub trait VmSignal: Send + Sync {
    /// Name recorded as an indicator when the signal fires
    fn name(&self) -> &str;

    fn evaluate(&self, evidence: &VmEvidence) -> SignalReading;
}

fn contains_any(haystack: Option<&str>, needles: &[&str]) -> SignalReading {
    match haystack {
        None => SignalReading::Unavailable,
        Some(text) => {
            let lower = text.to_lowercase();
            if needles.iter().any(|n| lower.contains(n)) {
                SignalReading::Fired
            } else {
                SignalReading::Quiet
            }
        }
    }
}

pub struct BiosManufacturerSignal;

impl VmSignal for BiosManufacturerSignal {
    fn name(&self) -> &str {
        BIOS_MANUFACTURER_KEY
    }

    fn evaluate(&self, evidence: &VmEvidence) -> SignalReading {
        contains_any(evidence.bios_manufacturer.as_deref(), BIOS_VENDORS)
    }
}

pub struct SystemManufacturerSignal;

impl VmSignal for SystemManufacturerSignal {
    fn name(&self) -> &str {
        SYSTEM_MANUFACTURER_KEY
    }

    fn evaluate(&self, evidence: &VmEvidence) -> SignalReading {
        contains_any(evidence.system_manufacturer.as_deref(), SYSTEM_VENDORS)
    }
}

pub struct SystemModelSignal;

impl VmSignal for SystemModelSignal {
    fn name(&self) -> &str {
        SYSTEM_MODEL_KEY
    }

    fn evaluate(&self, evidence: &VmEvidence) -> SignalReading {
        contains_any(evidence.system_model.as_deref(), SYSTEM_MODELS)
    }
}

/// Exact, case-insensitive process name match
pub struct GuestToolsSignal;

impl VmSignal for GuestToolsSignal {
    fn name(&self) -> &str {
        "Guest Tools Process"
    }

    fn evaluate(&self, evidence: &VmEvidence) -> SignalReading {
        match &evidence.processes {
            None => SignalReading::Unavailable,
            Some(names) => {
                let hit = names.iter().any(|name| {
                    let name = name.trim().to_lowercase();
                    GUEST_TOOL_PROCESSES.contains(&name.as_str())
                });
                if hit {
                    SignalReading::Fired
                } else {
                    SignalReading::Quiet
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    Virtual,
    Physical,
    /// No signal had any data
    Unknown,
}

impl VmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmStatus::Virtual => "Yes",
            VmStatus::Physical => "No",
            VmStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmVerdict {
    pub is_virtual: bool,
    /// Fired signal names, in signal order, without duplicates
    pub indicators: Vec<String>,
    /// Signals that had data (fired or quiet)
    pub signals_evaluated: usize,
}

impl VmVerdict {
    pub fn status(&self) -> VmStatus {
        if self.is_virtual {
            VmStatus::Virtual
        } else if self.signals_evaluated == 0 {
            VmStatus::Unknown
        } else {
            VmStatus::Physical
        }
    }

    /// The two facts the VM probe contributes to a snapshot
    pub fn to_facts(&self) -> Vec<Fact> {
        let indicators = if self.indicators.is_empty() {
            "None".to_string()
        } else {
            self.indicators.join(", ")
        };
        vec![
            Fact::new(IS_VM_KEY, self.status().as_str()),
            Fact::new(INDICATORS_KEY, indicators),
        ]
    }
}

pub struct VmDetector {
    signals: Vec<Box<dyn VmSignal>>,
}

impl Default for VmDetector {
    fn default() -> Self {
        Self::with_default_signals()
    }
}

impl VmDetector {
    /// A detector with no signals; add them with `with_signal`
    pub fn new() -> Self {
        Self {
            signals: Vec::new(),
        }
    }

    pub fn with_default_signals() -> Self {
        Self::new()
            .with_signal(BiosManufacturerSignal)
            .with_signal(SystemManufacturerSignal)
            .with_signal(SystemModelSignal)
            .with_signal(GuestToolsSignal)
    }

    pub fn with_signal(mut self, signal: impl VmSignal + 'static) -> Self {
        self.signals.push(Box::new(signal));
        self
    }

    pub fn signal_names(&self) -> Vec<&str> {
        self.signals.iter().map(|s| s.name()).collect()
    }

    pub fn evaluate(&self, evidence: &VmEvidence) -> VmVerdict {
        let mut indicators: Vec<String> = Vec::new();
        let mut evaluated = 0;

        for signal in &self.signals {
            match signal.evaluate(evidence) {
                SignalReading::Fired => {
                    evaluated += 1;
                    if !indicators.iter().any(|i| i == signal.name()) {
                        indicators.push(signal.name().to_string());
                    }
                }
                SignalReading::Quiet => evaluated += 1,
                SignalReading::Unavailable => {}
            }
        }

        let verdict = VmVerdict {
            is_virtual: !indicators.is_empty(),
            indicators,
            signals_evaluated: evaluated,
        };
        debug!(
            "VM verdict: {} (indicators: {:?}, evaluated {}/{})",
            verdict.status(),
            verdict.indicators,
            evaluated,
            self.signals.len()
        );
        verdict
    }

    pub fn evaluate_snapshot(&self, snapshot: &Snapshot) -> VmVerdict {
        self.evaluate(&VmEvidence::from_snapshot(snapshot))
    }
}
