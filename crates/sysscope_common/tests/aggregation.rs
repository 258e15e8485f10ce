//! Aggregator behaviour tests
//!
//! Uses synthetic probes only, so results do not depend on the host.
//! Covers failure isolation, deterministic ordering under varied
//! completion times, timeouts, panics and the interactive event API.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use sysscope_common::{
    spawn_collection, Aggregator, CapabilitySet, CollectionEvent, Config, Fact, FnProbe,
    Platform, ProbeContext, ProbeFailure, ProbeGroup, Requirement, Value,
};

fn context_with(config: Config) -> ProbeContext {
    ProbeContext::new(CapabilitySet::minimal(Platform::Linux), config)
}

fn context() -> ProbeContext {
    context_with(Config::default())
}

/// A probe that sleeps `delay_ms` then yields one fact per key
fn slow_probe(label: &'static str, delay_ms: u64, keys: &'static [&'static str]) -> FnProbe {
    FnProbe::new(label, move |_| {
        thread::sleep(Duration::from_millis(delay_ms));
        Ok(keys.iter().map(|k| Fact::new(*k, label)).collect())
    })
}

fn keys(snapshot: &sysscope_common::Snapshot) -> Vec<String> {
    snapshot.keys().map(str::to_string).collect()
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_failing_probe_only_affects_itself() {
    let ctx = context();
    let groups = vec![
        ProbeGroup::new("basic", &ctx)
            .with(slow_probe("OS Name", 0, &["OS Name", "OS Version"]))
            .with(FnProbe::new("GPU", |_| Err(ProbeFailure::missing("nvidia-smi not found")))),
        ProbeGroup::new("storage", &ctx).with(slow_probe("Disk", 0, &["Total Disk Space (GB)"])),
    ];

    let snapshot = Aggregator::new(ctx, groups).collect().await;

    assert_eq!(
        keys(&snapshot),
        vec!["OS Name", "OS Version", "GPU", "Total Disk Space (GB)"]
    );
    assert_eq!(
        snapshot.get("GPU").and_then(Value::as_text),
        Some("Not available (missing dependency: nvidia-smi not found)")
    );
}

#[tokio::test]
async fn test_panicking_probe_becomes_runtime_error() {
    let ctx = context();
    let group = ProbeGroup::new("hardware", &ctx)
        .with(FnProbe::new("Battery", |_| panic!("sysfs exploded")))
        .with(slow_probe("CPU", 0, &["CPU Logical Cores"]));

    let snapshot = Aggregator::new(ctx, vec![group]).collect().await;

    let battery = snapshot.get("Battery").and_then(Value::as_text).unwrap();
    assert!(battery.starts_with("Not available (runtime error: panicked"));
    assert!(battery.contains("sysfs exploded"));
    assert!(snapshot.contains_key("CPU Logical Cores"));
}

#[tokio::test]
async fn test_slow_probe_times_out() {
    let mut config = Config::default();
    config.collection.probe_timeout_ms = 100;
    let ctx = context_with(config);
    let group = ProbeGroup::new("network", &ctx)
        .with(slow_probe("Open Ports", 1_000, &["Open Ports (Local Sample)"]))
        .with(slow_probe("Hostname", 0, &["Hostname"]));

    let snapshot = Aggregator::new(ctx, vec![group]).collect().await;

    assert_eq!(
        snapshot.get("Open Ports").and_then(Value::as_text),
        Some("Not available (runtime error: timed out after 100 ms)")
    );
    assert!(!snapshot.contains_key("Open Ports (Local Sample)"));
    assert!(snapshot.contains_key("Hostname"));
    assert_eq!(snapshot.stats().timed_out, 1);
}

#[tokio::test]
async fn test_ineligible_probe_is_never_invoked() {
    let ctx = context();
    let group = ProbeGroup::new("security", &ctx).with(
        FnProbe::new("Windows Security", |_| panic!("must not run"))
            .requires(Requirement::Platform(Platform::Windows)),
    );

    let snapshot = Aggregator::new(ctx, vec![group]).collect().await;

    let text = snapshot.get("Windows Security").and_then(Value::as_text).unwrap();
    assert!(text.starts_with("Not available (unsupported:"));
    assert_eq!(snapshot.stats().skipped, 1);
}

#[tokio::test]
async fn test_all_failing_still_yields_snapshot() {
    let ctx = context();
    let group = ProbeGroup::new("everything", &ctx)
        .with(FnProbe::new("CPU", |_| Err(ProbeFailure::runtime("a"))))
        .with(FnProbe::new("Memory", |_| Err(ProbeFailure::runtime("b"))))
        .with(FnProbe::new("Disk", |_| Err(ProbeFailure::unsupported("c"))));

    let snapshot = Aggregator::new(ctx, vec![group]).collect().await;

    assert_eq!(keys(&snapshot), vec!["CPU", "Memory", "Disk"]);
    assert!(snapshot
        .iter()
        .all(|f| ProbeFailure::is_placeholder_text(f.value.as_text().unwrap_or(""))));
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn test_order_is_declaration_order_not_completion_order() {
    let mut config = Config::default();
    config.collection.max_workers = 4;

    let build = |ctx: &ProbeContext, delays: [u64; 4]| {
        vec![
            ProbeGroup::new("first", ctx)
                .with(slow_probe("A", delays[0], &["A1", "A2"]))
                .with(slow_probe("B", delays[1], &["B1"])),
            ProbeGroup::new("second", ctx)
                .with(slow_probe("C", delays[2], &["C1"]))
                .with(slow_probe("D", delays[3], &["D1", "D2"])),
        ]
    };

    // Later probes finish first in the first run, earlier ones in the second
    let ctx = context_with(config.clone());
    let first = Aggregator::new(ctx.clone(), build(&ctx, [120, 80, 40, 0])).collect().await;
    let ctx = context_with(config);
    let second = Aggregator::new(ctx.clone(), build(&ctx, [0, 40, 80, 120])).collect().await;

    let expected = vec!["A1", "A2", "B1", "C1", "D1", "D2"];
    assert_eq!(keys(&first), expected);
    assert_eq!(keys(&second), expected);
}

#[tokio::test]
async fn test_single_worker_still_completes() {
    let mut config = Config::default();
    config.collection.max_workers = 1;
    let ctx = context_with(config);
    let group = ProbeGroup::new("serial", &ctx)
        .with(slow_probe("A", 10, &["A"]))
        .with(slow_probe("B", 10, &["B"]))
        .with(slow_probe("C", 10, &["C"]));

    let snapshot = Aggregator::new(ctx, vec![group]).collect().await;
    assert_eq!(keys(&snapshot), vec!["A", "B", "C"]);
    assert_eq!(snapshot.stats().succeeded, 3);
}

#[tokio::test]
async fn test_hung_task_does_not_starve_single_worker() {
    let mut config = Config::default();
    config.collection.max_workers = 1;
    config.collection.probe_timeout_ms = 100;
    let ctx = context_with(config);
    let group = ProbeGroup::new("serial", &ctx)
        .with(slow_probe("Hung", 3_000, &["Hung Key"]))
        .with(slow_probe("Fast", 0, &["Fast Key"]));

    let aggregator = Aggregator::new(ctx, vec![group]);
    let snapshot = tokio::time::timeout(Duration::from_secs(2), aggregator.collect())
        .await
        .expect("the worker slot must be released when the deadline fires");

    assert_eq!(
        snapshot.get("Hung").and_then(Value::as_text),
        Some("Not available (runtime error: timed out after 100 ms)")
    );
    assert!(snapshot.contains_key("Fast Key"));
    assert_eq!(snapshot.stats().timed_out, 1);
    assert_eq!(snapshot.stats().succeeded, 1);
}

#[tokio::test]
async fn test_colliding_keys_last_write_wins() {
    let ctx = context();
    let group = ProbeGroup::new("dupes", &ctx)
        .with(FnProbe::new("First", |_| Ok(vec![Fact::new("Hostname", "one")])))
        .with(FnProbe::new("Second", |_| {
            Ok(vec![Fact::new("Uptime", "0:01:00"), Fact::new("Hostname", "two")])
        }));

    let snapshot = Aggregator::new(ctx, vec![group]).collect().await;
    assert_eq!(keys(&snapshot), vec!["Hostname", "Uptime"]);
    assert_eq!(snapshot.get("Hostname").and_then(Value::as_text), Some("two"));
}

// ============================================================================
// Interactive API
// ============================================================================

#[tokio::test]
async fn test_spawn_collection_delivers_one_event() {
    let ctx = context();
    let group = ProbeGroup::new("basic", &ctx).with(slow_probe("OS Name", 20, &["OS Name"]));
    let aggregator = Arc::new(Aggregator::new(ctx, vec![group]));

    let event = spawn_collection(aggregator).await.unwrap();
    match event {
        CollectionEvent::SnapshotReady(snapshot) => {
            assert_eq!(keys(&snapshot), vec!["OS Name"]);
            assert_eq!(snapshot.stats().planned, 1);
        }
        CollectionEvent::SnapshotFailed(e) => panic!("unexpected failure: {}", e),
    }
}
