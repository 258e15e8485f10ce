//! Configuration management for sysscope.
//!
//! Loads settings from a TOML file or uses defaults. Lookup order:
//! explicit path → $SYSSCOPE_CONFIG → <config dir>/sysscope/config.toml.
//! A missing default file is fine; a missing explicit file is an error.

use crate::classify::{Category, ClassificationRule};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "SYSSCOPE_CONFIG";

/// Upper bound for the automatic worker count
const MAX_AUTO_WORKERS: usize = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub collection: CollectionConfig,

    #[serde(default)]
    pub probes: ProbesConfig,

    #[serde(default)]
    pub report: ReportConfig,

    /// Per-category keyword overrides, keyed by category name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classification: BTreeMap<String, Vec<String>>,
}

/// Aggregator scheduling and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Outer bound for a single probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Bound for each external command a probe runs
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Connect timeout for the local port sample
    #[serde(default = "default_port_timeout")]
    pub port_timeout_ms: u64,

    /// Worker pool size; 0 picks one from the CPU count
    #[serde(default)]
    pub max_workers: usize,
}

fn default_probe_timeout() -> u64 {
    5_000
}

fn default_command_timeout() -> u64 {
    2_000
}

fn default_port_timeout() -> u64 {
    50
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout(),
            command_timeout_ms: default_command_timeout(),
            port_timeout_ms: default_port_timeout(),
            max_workers: 0,
        }
    }
}

impl CollectionConfig {
    pub fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            num_cpus::get().clamp(1, MAX_AUTO_WORKERS)
        }
    }
}

/// Limits and knobs for individual probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbesConfig {
    #[serde(default = "default_max_partitions")]
    pub max_partitions: usize,

    #[serde(default = "default_max_interfaces")]
    pub max_interfaces: usize,

    /// Local ports sampled by the open-ports probe
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Probe labels to skip
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_max_partitions() -> usize {
    5
}

fn default_max_interfaces() -> usize {
    3
}

fn default_ports() -> Vec<u16> {
    vec![80, 443, 3389, 22]
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            max_partitions: default_max_partitions(),
            max_interfaces: default_max_interfaces(),
            ports: default_ports(),
            disabled: Vec::new(),
        }
    }
}

impl ProbesConfig {
    pub fn is_disabled(&self, label: &str) -> bool {
        self.disabled.iter().any(|d| d.eq_ignore_ascii_case(label))
    }
}

/// Paginated document layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_page_lines")]
    pub page_lines: usize,

    #[serde(default = "default_page_width")]
    pub page_width: usize,

    #[serde(default = "default_title")]
    pub title: String,
}

fn default_page_lines() -> usize {
    60
}

fn default_page_width() -> usize {
    100
}

fn default_title() -> String {
    crate::render::REPORT_TITLE.to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            page_lines: default_page_lines(),
            page_width: default_page_width(),
            title: default_title(),
        }
    }
}

impl Config {
    /// Resolve and load the configuration
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_file(Path::new(&path));
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sysscope").join("config.toml"))
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.collection;
        if c.probe_timeout_ms == 0 {
            return Err(ConfigError::invalid("collection.probe_timeout_ms", "must be > 0"));
        }
        if c.command_timeout_ms == 0 {
            return Err(ConfigError::invalid("collection.command_timeout_ms", "must be > 0"));
        }
        if c.port_timeout_ms == 0 {
            return Err(ConfigError::invalid("collection.port_timeout_ms", "must be > 0"));
        }
        if self.report.page_lines < 10 {
            return Err(ConfigError::invalid("report.page_lines", "must be at least 10"));
        }
        if self.report.page_width < 40 {
            return Err(ConfigError::invalid("report.page_width", "must be at least 40"));
        }
        self.classification_rules().map(|_| ())
    }

    /// Classification rules with any configured keyword overrides applied
    pub fn classification_rules(&self) -> Result<Vec<ClassificationRule>, ConfigError> {
        let mut rules = ClassificationRule::defaults();
        for (name, keywords) in &self.classification {
            let category = Category::from_name(name)
                .filter(|c| *c != Category::Other)
                .ok_or_else(|| ConfigError::UnknownCategory(name.clone()))?;
            if let Some(rule) = rules.iter_mut().find(|r| r.category == category) {
                rule.keywords = keywords.clone();
            }
        }
        Ok(rules)
    }
}
