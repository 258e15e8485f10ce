//! Live-host catalogue tests
//!
//! These run the real probes, so they only check structure: every probe
//! either contributed its facts or left a placeholder under its label.
//! Values are never asserted.

use std::collections::HashSet;
use sysscope_common::{
    Aggregator, CapabilitySet, Category, Classifier, Config, Platform, ProbeContext,
    ProbeFailure,
};
use sysscope_probes::default_groups;

fn live_context() -> ProbeContext {
    ProbeContext::new(CapabilitySet::detect(), Config::default())
}

#[test]
fn test_catalogue_labels_are_unique_and_ordered() {
    let ctx = live_context();
    let groups = default_groups(&ctx);

    let names: Vec<&str> = groups.iter().map(|g| g.name()).collect();
    assert_eq!(
        names,
        vec!["basic", "hardware", "storage", "network", "security", "software"]
    );

    let labels: Vec<&str> = groups
        .iter()
        .flat_map(|g| g.probes().iter().map(|p| p.label()))
        .collect();
    let unique: HashSet<&str> = labels.iter().copied().collect();
    assert_eq!(labels.len(), unique.len(), "duplicate probe label in {:?}", labels);
}

#[test]
fn test_placeholders_land_in_their_own_category() {
    let ctx = live_context();
    let classifier = Classifier::default();
    let expected = [
        ("OS Name", Category::System),
        ("Current User", Category::System),
        ("Virtual Machine", Category::System),
        ("CPU", Category::Hardware),
        ("GPU", Category::Hardware),
        ("BIOS", Category::Hardware),
        ("Disk Partitions", Category::Storage),
        ("Network Interfaces", Category::Network),
        ("Open Ports", Category::Network),
        ("Windows Security", Category::Security),
        ("Pending Updates", Category::Security),
        ("Installed Programs", Category::Software),
        ("Browser History", Category::Software),
        ("Environment", Category::Environment),
    ];

    let labels: HashSet<String> = default_groups(&ctx)
        .iter()
        .flat_map(|g| g.probes().iter().map(|p| p.label().to_string()))
        .collect();

    for (label, category) in expected {
        assert!(labels.contains(label), "missing probe {}", label);
        assert_eq!(classifier.category_of(label), category, "label {}", label);
    }
}

#[test]
fn test_windows_only_probe_skipped_elsewhere() {
    let ctx = ProbeContext::new(CapabilitySet::minimal(Platform::Linux), Config::default());
    let groups = default_groups(&ctx);
    let windows = groups
        .iter()
        .flat_map(|g| g.probes())
        .find(|p| p.label() == "Windows Security")
        .unwrap();
    assert!(!windows.is_eligible());
}

#[tokio::test]
async fn test_live_collection_has_fact_or_placeholder_per_probe() {
    let ctx = live_context();
    let groups = default_groups(&ctx);
    let planned = groups.iter().map(|g| g.len()).sum::<usize>();
    let snapshot = Aggregator::new(ctx, groups).collect().await;

    let stats = snapshot.stats();
    assert_eq!(stats.planned, planned);
    assert_eq!(
        stats.succeeded + stats.failed + stats.skipped + stats.timed_out,
        planned
    );

    // Always-available probes contribute their primary key or a placeholder
    let primary = [
        ("OS Name", "OS Name"),
        ("Current User", "Current User"),
        ("Is Virtual Machine", "Virtual Machine"),
        ("Shell", "Environment"),
    ];
    for (key, label) in primary {
        assert!(
            snapshot.contains_key(key) || snapshot.contains_key(label),
            "neither {} nor a {} placeholder present",
            key,
            label
        );
    }

    // Any text fact that looks like a placeholder carries a known reason
    for fact in &snapshot {
        if let Some(text) = fact.value.as_text() {
            if ProbeFailure::is_placeholder_text(text) {
                assert!(
                    text.contains("unsupported")
                        || text.contains("missing dependency")
                        || text.contains("runtime error"),
                    "placeholder without reason: {}",
                    text
                );
            }
        }
    }
}
