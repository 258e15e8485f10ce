//! Fact model - the values probes produce and the snapshot that holds them
//!
//! A snapshot is an ordered key → value mapping. Order is the order in
//! which facts were inserted, which the aggregator guarantees to be the
//! declared probe order. Keys are human-readable labels; a repeated key
//! replaces the earlier value in place (last write wins).

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// A single leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Integer(n) => write!(f, "{}", n),
            Scalar::Float(v) => {
                let rounded = round2(*v);
                if rounded.fract() == 0.0 {
                    write!(f, "{:.1}", rounded)
                } else {
                    write!(f, "{}", rounded)
                }
            }
            Scalar::Bool(true) => write!(f, "Yes"),
            Scalar::Bool(false) => write!(f, "No"),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Text(s) => serializer.serialize_str(s),
            Scalar::Integer(n) => serializer.serialize_i64(*n),
            Scalar::Float(v) => serializer.serialize_f64(*v),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Round to two decimals, the precision every size/percentage fact uses
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// A fact value: either a leaf or an ordered nested block
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Group(Vec<Fact>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Text(s.into()))
    }

    pub fn int(n: i64) -> Self {
        Value::Scalar(Scalar::Integer(n))
    }

    pub fn float(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }

    pub fn flag(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }

    /// Text content if this is a text scalar
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Value::Group(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Group(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{}: {}", e.key, e.value))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => s.serialize(serializer),
            Value::Group(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for entry in entries {
                    map.serialize_entry(&entry.key, &entry.value)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::flag(b)
    }
}

/// One labeled value
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub key: String,
    pub value: Value,
}

impl Fact {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Nested block under a single key
    pub fn group(key: impl Into<String>, entries: Vec<Fact>) -> Self {
        Self {
            key: key.into(),
            value: Value::Group(entries),
        }
    }
}

/// Per-run probe statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeStats {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
}

/// The full ordered set of facts from one collection run
#[derive(Debug, Clone)]
pub struct Snapshot {
    run_id: Uuid,
    collected_at: DateTime<Utc>,
    facts: Vec<Fact>,
    index: HashMap<String, usize>,
    stats: ProbeStats,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::with_metadata(Uuid::new_v4(), Utc::now())
    }

    pub fn with_metadata(run_id: Uuid, collected_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            collected_at,
            facts: Vec::new(),
            index: HashMap::new(),
            stats: ProbeStats::default(),
        }
    }

    /// Build a snapshot from facts in order (mostly for tests and tooling)
    pub fn from_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut snapshot = Self::new();
        snapshot.extend(facts);
        snapshot
    }

    /// Insert a fact. A repeated key keeps its position and takes the new value.
    pub fn insert(&mut self, fact: Fact) {
        match self.index.get(&fact.key) {
            Some(&pos) => self.facts[pos].value = fact.value,
            None => {
                self.index.insert(fact.key.clone(), self.facts.len());
                self.facts.push(fact);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&pos| &self.facts[pos].value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fact> {
        self.facts.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.facts.iter().map(|f| f.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    pub fn stats(&self) -> ProbeStats {
        self.stats
    }

    pub(crate) fn set_stats(&mut self, stats: ProbeStats) {
        self.stats = stats;
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<Fact> for Snapshot {
    fn extend<T: IntoIterator<Item = Fact>>(&mut self, iter: T) {
        for fact in iter {
            self.insert(fact);
        }
    }
}

impl FromIterator<Fact> for Snapshot {
    fn from_iter<T: IntoIterator<Item = Fact>>(iter: T) -> Self {
        Self::from_facts(iter)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Fact;
    type IntoIter = std::slice::Iter<'a, Fact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}

/// Serializes as `{ run_id, collected_at, stats, facts: { key: value, ... } }`
/// with facts in insertion order.
impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct OrderedFacts<'a>(&'a [Fact]);

        impl Serialize for OrderedFacts<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for fact in self.0 {
                    map.serialize_entry(&fact.key, &fact.value)?;
                }
                map.end()
            }
        }

        let mut state = serializer.serialize_struct("Snapshot", 4)?;
        state.serialize_field("run_id", &self.run_id)?;
        state.serialize_field("collected_at", &self.collected_at)?;
        state.serialize_field("stats", &self.stats)?;
        state.serialize_field("facts", &OrderedFacts(&self.facts))?;
        state.end()
    }
}
