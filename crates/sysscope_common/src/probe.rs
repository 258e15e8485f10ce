//! Probe contract - one named unit of fact gathering with isolated failure
//!
//! A probe never lets a failure escape: every error it can hit becomes a
//! `ProbeFailure`, which the aggregator turns into a visible placeholder.
//! Platform and dependency eligibility is declared as data (`Requirement`)
//! and resolved once when the probe is registered into a group.

use crate::capability::{CapabilitySet, Platform};
use crate::config::Config;
use crate::model::{Fact, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a probe produced no facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Feature not applicable on this platform
    Unsupported,
    /// Optional external capability absent
    MissingDependency,
    /// The underlying call failed or timed out
    RuntimeError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Unsupported => "unsupported",
            FailureReason::MissingDependency => "missing dependency",
            FailureReason::RuntimeError => "runtime error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {detail}")]
pub struct ProbeFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl ProbeFailure {
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::Unsupported,
            detail: detail.into(),
        }
    }

    pub fn missing(detail: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::MissingDependency,
            detail: detail.into(),
        }
    }

    pub fn runtime(detail: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::RuntimeError,
            detail: detail.into(),
        }
    }

    /// Text shown in place of the probe's facts
    pub fn placeholder_text(&self) -> String {
        format!("Not available ({}: {})", self.reason, self.detail)
    }

    /// The single fact that stands in for a failed probe
    pub fn placeholder(&self, label: &str) -> Fact {
        Fact::new(label, Value::text(self.placeholder_text()))
    }

    pub fn is_placeholder_text(text: &str) -> bool {
        text.starts_with("Not available (")
    }
}

impl From<std::io::Error> for ProbeFailure {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ProbeFailure::missing(e.to_string()),
            _ => ProbeFailure::runtime(e.to_string()),
        }
    }
}

/// Result of running one probe
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success(Vec<Fact>),
    Failure(ProbeFailure),
}

impl ProbeOutcome {
    /// Facts to merge: the probe's own facts, or one placeholder
    pub fn into_facts(self, label: &str) -> Vec<Fact> {
        match self {
            ProbeOutcome::Success(facts) => facts,
            ProbeOutcome::Failure(failure) => vec![failure.placeholder(label)],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_))
    }
}

impl From<Result<Vec<Fact>, ProbeFailure>> for ProbeOutcome {
    fn from(result: Result<Vec<Fact>, ProbeFailure>) -> Self {
        match result {
            Ok(facts) => ProbeOutcome::Success(facts),
            Err(failure) => ProbeOutcome::Failure(failure),
        }
    }
}

/// A precondition a probe declares up front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Platform(Platform),
    /// Linux or macOS
    Unix,
    Tool(&'static str),
    /// At least one of the listed tools
    AnyTool(&'static [&'static str]),
    /// Firmware identity in sysfs
    Dmi,
    /// Battery state in sysfs
    PowerSupply,
}

impl Requirement {
    /// `None` when satisfied, otherwise the failure the probe would report
    pub fn check(&self, caps: &CapabilitySet) -> Option<ProbeFailure> {
        match self {
            Requirement::Platform(p) if caps.platform != *p => Some(ProbeFailure::unsupported(
                format!("requires {}, running on {}", p.as_str(), caps.platform.as_str()),
            )),
            Requirement::Unix if !caps.platform.is_unix() => Some(ProbeFailure::unsupported(
                format!("requires a Unix platform, running on {}", caps.platform.as_str()),
            )),
            Requirement::Tool(tool) if !caps.has_tool(tool) => {
                Some(ProbeFailure::missing(format!("{} not found", tool)))
            }
            Requirement::AnyTool(tools) if !tools.iter().any(|t| caps.has_tool(t)) => Some(
                ProbeFailure::missing(format!("none of {} found", tools.join(", "))),
            ),
            Requirement::Dmi if !caps.dmi => {
                Some(ProbeFailure::missing("firmware information not readable"))
            }
            Requirement::PowerSupply if !caps.power_supply => {
                Some(ProbeFailure::missing("power supply information not readable"))
            }
            _ => None,
        }
    }
}

/// Construction-time environment handed to every probe
#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub capabilities: Arc<CapabilitySet>,
    pub config: Arc<Config>,
}

impl ProbeContext {
    pub fn new(capabilities: CapabilitySet, config: Config) -> Self {
        Self {
            capabilities: Arc::new(capabilities),
            config: Arc::new(config),
        }
    }
}

pub trait Probe: Send + Sync {
    /// Human-readable label; also the key of the failure placeholder
    fn label(&self) -> &str;

    fn requirements(&self) -> &[Requirement] {
        &[]
    }

    fn collect(&self, ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure>;
}

type ProbeFn = dyn Fn(&ProbeContext) -> Result<Vec<Fact>, ProbeFailure> + Send + Sync;

/// A probe backed by a plain function or closure
pub struct FnProbe {
    label: String,
    requirements: Vec<Requirement>,
    func: Box<ProbeFn>,
}

impl FnProbe {
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ProbeContext) -> Result<Vec<Fact>, ProbeFailure> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            requirements: Vec::new(),
            func: Box::new(func),
        }
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }
}

impl fmt::Debug for FnProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProbe")
            .field("label", &self.label)
            .field("requirements", &self.requirements)
            .finish()
    }
}

impl Probe for FnProbe {
    fn label(&self) -> &str {
        &self.label
    }

    fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    fn collect(&self, ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
        (self.func)(ctx)
    }
}

/// A probe plus its eligibility, resolved at registration
#[derive(Clone)]
pub struct RegisteredProbe {
    pub probe: Arc<dyn Probe>,
    skip: Option<ProbeFailure>,
}

impl RegisteredProbe {
    pub fn label(&self) -> &str {
        self.probe.label()
    }

    pub fn is_eligible(&self) -> bool {
        self.skip.is_none()
    }

    /// The failure reported instead of running, if ineligible
    pub fn skip_reason(&self) -> Option<&ProbeFailure> {
        self.skip.as_ref()
    }
}

/// Named, ordered list of probes sharing a topic
pub struct ProbeGroup {
    name: String,
    ctx: ProbeContext,
    probes: Vec<RegisteredProbe>,
}

impl ProbeGroup {
    pub fn new(name: impl Into<String>, ctx: &ProbeContext) -> Self {
        Self {
            name: name.into(),
            ctx: ctx.clone(),
            probes: Vec::new(),
        }
    }

    /// Register a probe, resolving its eligibility against the capability set
    pub fn register(&mut self, probe: impl Probe + 'static) {
        let probe: Arc<dyn Probe> = Arc::new(probe);
        let skip = if self.ctx.config.probes.is_disabled(probe.label()) {
            Some(ProbeFailure::unsupported("disabled by configuration"))
        } else {
            probe
                .requirements()
                .iter()
                .find_map(|req| req.check(&self.ctx.capabilities))
        };
        self.probes.push(RegisteredProbe { probe, skip });
    }

    pub fn with(mut self, probe: impl Probe + 'static) -> Self {
        self.register(probe);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probes(&self) -> &[RegisteredProbe] {
        &self.probes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(caps: CapabilitySet) -> ProbeContext {
        ProbeContext::new(caps, Config::default())
    }

    #[test]
    fn test_placeholder_uses_label_and_reason() {
        let failure = ProbeFailure::missing("nvidia-smi not found");
        let fact = failure.placeholder("GPU");
        assert_eq!(fact.key, "GPU");
        assert_eq!(
            fact.value.as_text(),
            Some("Not available (missing dependency: nvidia-smi not found)")
        );
    }

    #[test]
    fn test_platform_requirement_is_unsupported() {
        let caps = CapabilitySet::minimal(Platform::Linux);
        let failure = Requirement::Platform(Platform::Windows).check(&caps).unwrap();
        assert_eq!(failure.reason, FailureReason::Unsupported);
        assert!(Requirement::Platform(Platform::Linux).check(&caps).is_none());
        assert!(Requirement::Unix.check(&caps).is_none());
    }

    #[test]
    fn test_tool_requirement_is_missing_dependency() {
        let caps = CapabilitySet::minimal(Platform::Linux).with_tool("python");
        let failure = Requirement::Tool("nmcli").check(&caps).unwrap();
        assert_eq!(failure.reason, FailureReason::MissingDependency);
        assert!(Requirement::AnyTool(&["python3", "python"]).check(&caps).is_none());
    }

    #[test]
    fn test_group_resolves_eligibility_at_registration() {
        let ctx = ctx(CapabilitySet::minimal(Platform::Linux));
        let group = ProbeGroup::new("network", &ctx)
            .with(FnProbe::new("DNS Servers", |_| Ok(vec![])).requires(Requirement::Unix))
            .with(
                FnProbe::new("WiFi", |_| Ok(vec![]))
                    .requires(Requirement::Platform(Platform::Windows))
                    .requires(Requirement::Tool("netsh")),
            );

        assert!(group.probes()[0].is_eligible());
        assert!(!group.probes()[1].is_eligible());
        // First unmet requirement is the one reported
        assert_eq!(
            group.probes()[1].skip_reason().map(|f| f.reason),
            Some(FailureReason::Unsupported)
        );
    }

    #[test]
    fn test_disabled_probe_is_skipped() {
        let mut config = Config::default();
        config.probes.disabled = vec!["Open Ports".to_string()];
        let ctx = ProbeContext::new(CapabilitySet::minimal(Platform::Linux), config);

        let group = ProbeGroup::new("network", &ctx).with(FnProbe::new("Open Ports", |_| Ok(vec![])));
        assert!(!group.probes()[0].is_eligible());
    }

    #[test]
    fn test_outcome_from_result() {
        let ok = ProbeOutcome::from(Ok::<_, ProbeFailure>(vec![Fact::new("A", "1")]));
        assert!(ok.is_success());
        let err = ProbeOutcome::from(Err::<Vec<Fact>, _>(ProbeFailure::runtime("boom")));
        assert_eq!(err.into_facts("Thing")[0].key, "Thing");
    }
}
