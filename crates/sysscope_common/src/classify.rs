//! Category classifier - keyword heuristics from fact keys to display sections
//!
//! Rules are scanned in category order and the first rule with a matching
//! keyword wins. A key that contains keywords of two categories therefore
//! lands in the earlier one (e.g. "Network Boot Time" is System, not
//! Network). Keys matching nothing go to `Other`.

use crate::config::Config;
use crate::error::ConfigError;
use crate::model::{Fact, Snapshot};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    System,
    Hardware,
    Storage,
    Network,
    Security,
    Software,
    Environment,
    Other,
}

impl Category {
    /// Display order
    pub const ALL: [Category; 8] = [
        Category::System,
        Category::Hardware,
        Category::Storage,
        Category::Network,
        Category::Security,
        Category::Software,
        Category::Environment,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "System",
            Category::Hardware => "Hardware",
            Category::Storage => "Storage",
            Category::Network => "Network",
            Category::Security => "Security",
            Category::Software => "Software",
            Category::Environment => "Environment",
            Category::Other => "Other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category and the keywords that select it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl ClassificationRule {
    pub fn new(category: Category, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Case-insensitive substring match against any keyword
    pub fn matches(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && key.contains(&k.to_lowercase()))
    }

    /// Built-in rule table, in priority order
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                Category::System,
                &[
                    "OS Name",
                    "OS Version",
                    "OS Release",
                    "OS Platform",
                    "Kernel",
                    "Hostname",
                    "Current User",
                    "Logged-in Users",
                    "Uptime",
                    "Boot Time",
                    "Virtual Machine",
                ],
            ),
            Self::new(
                Category::Hardware,
                &[
                    "CPU",
                    "Processor",
                    "Architecture",
                    "Memory",
                    "Swap",
                    "GPU",
                    "Battery",
                    "BIOS",
                    "System Manufacturer",
                    "System Model",
                    "Temperature",
                ],
            ),
            Self::new(Category::Storage, &["Disk", "Partition"]),
            Self::new(
                Category::Network,
                &["IP Address", "FQDN", "Network", "Interface", "DNS", "WiFi", "Port"],
            ),
            Self::new(
                Category::Security,
                &["Defender", "Antivirus", "Firewall", "UAC", "Update", "Security"],
            ),
            Self::new(
                Category::Software,
                &["Python", "Development Tools", "Installed Programs", "Package", "Browser"],
            ),
            Self::new(
                Category::Environment,
                &["Environment", "Locale", "Encoding", "Timezone", "Shell"],
            ),
        ]
    }
}

/// Facts grouped by category, in category display order
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedReport {
    sections: Vec<(Category, Vec<Fact>)>,
}

impl ClassifiedReport {
    /// Every category in display order, including empty ones
    pub fn sections(&self) -> &[(Category, Vec<Fact>)] {
        &self.sections
    }

    pub fn facts(&self, category: Category) -> &[Fact] {
        self.sections
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, facts)| facts.as_slice())
            .unwrap_or(&[])
    }

    pub fn keys(&self, category: Category) -> Vec<&str> {
        self.facts(category).iter().map(|f| f.key.as_str()).collect()
    }

    pub fn non_empty(&self) -> impl Iterator<Item = &(Category, Vec<Fact>)> {
        self.sections.iter().filter(|(_, facts)| !facts.is_empty())
    }

    /// Total number of facts across all categories
    pub fn len(&self) -> usize {
        self.sections.iter().map(|(_, facts)| facts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassificationRule::defaults())
    }
}

impl Classifier {
    /// Rules are re-sorted into category order, so priority always follows
    /// `Category::ALL` regardless of how they were supplied.
    pub fn new(mut rules: Vec<ClassificationRule>) -> Self {
        rules.sort_by_key(|r| r.category);
        Self { rules }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.classification_rules()?))
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn category_of(&self, key: &str) -> Category {
        self.rules
            .iter()
            .find(|rule| rule.matches(key))
            .map(|rule| rule.category)
            .unwrap_or(Category::Other)
    }

    /// Pure: the snapshot is not modified and the same input gives the same output
    pub fn classify(&self, snapshot: &Snapshot) -> ClassifiedReport {
        let mut sections: Vec<(Category, Vec<Fact>)> =
            Category::ALL.iter().map(|c| (*c, Vec::new())).collect();

        for fact in snapshot {
            let category = self.category_of(&fact.key);
            // ALL is indexed by discriminant order
            sections[category as usize].1.push(fact.clone());
        }

        ClassifiedReport { sections }
    }
}
