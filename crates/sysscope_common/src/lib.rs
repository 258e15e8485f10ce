//! sysscope Common - Shared collection engine for sysscope
//!
//! Everything that is not a direct call into the host lives here: the fact
//! model, the probe contract, capability detection, the aggregator, the
//! category classifier, the VM heuristic and the report rendering contract.

pub mod aggregator;
pub mod capability;
pub mod classify;
pub mod command_exec;
pub mod config;
pub mod error;
pub mod model;
pub mod probe;
pub mod render;
pub mod vm_detect;

pub use aggregator::{spawn_collection, Aggregator, CollectionEvent};
pub use capability::{CapabilitySet, Platform};
pub use classify::{Category, ClassificationRule, ClassifiedReport, Classifier};
pub use config::Config;
pub use error::{ConfigError, SinkError};
pub use model::{Fact, ProbeStats, Scalar, Snapshot, Value};
pub use probe::{
    FailureReason, FnProbe, Probe, ProbeContext, ProbeFailure, ProbeGroup, ProbeOutcome,
    Requirement,
};
pub use render::{render, render_with_title, ReportSink, REPORT_TITLE};
pub use vm_detect::{SignalReading, VmDetector, VmEvidence, VmSignal, VmStatus, VmVerdict};
