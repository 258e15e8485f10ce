//! Snapshot aggregator - run every probe group and merge the results.
//!
//! Probes run on a bounded pool of blocking workers, each under its own
//! timeout. Results are stored by global probe index and merged in that
//! order, so the snapshot layout never depends on completion order.
//! The aggregator itself cannot fail: errors, panics and timeouts all
//! become placeholder facts.

use crate::model::{Fact, ProbeStats, Snapshot};
use crate::probe::{ProbeContext, ProbeFailure, ProbeGroup, ProbeOutcome};
use chrono::Utc;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Delivered once by `spawn_collection`
#[derive(Debug)]
pub enum CollectionEvent {
    SnapshotReady(Snapshot),
    SnapshotFailed(String),
}

/// How a single probe ended, for the run statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Succeeded,
    Failed,
    TimedOut,
    Skipped,
}

pub struct Aggregator {
    ctx: ProbeContext,
    groups: Vec<ProbeGroup>,
}

impl Aggregator {
    pub fn new(ctx: ProbeContext, groups: Vec<ProbeGroup>) -> Self {
        Self { ctx, groups }
    }

    pub fn groups(&self) -> &[ProbeGroup] {
        &self.groups
    }

    pub fn planned(&self) -> usize {
        self.groups.iter().map(ProbeGroup::len).sum()
    }

    /// Run every registered probe and build the snapshot
    pub async fn collect(&self) -> Snapshot {
        let run_id = Uuid::new_v4();
        let span = info_span!("collect", %run_id);
        self.collect_inner(run_id).instrument(span).await
    }

    async fn collect_inner(&self, run_id: Uuid) -> Snapshot {
        let started_at = Utc::now();
        let started = Instant::now();
        let collection = &self.ctx.config.collection;
        let workers = collection.effective_workers();
        let probe_timeout = Duration::from_millis(collection.probe_timeout_ms);
        let semaphore = Arc::new(Semaphore::new(workers));

        info!(
            "Running {} planned probes in {} groups ({} workers)",
            self.planned(),
            self.groups.len(),
            workers
        );

        // One slot per probe, in declaration order
        let mut slots: Vec<(String, Slot)> = Vec::with_capacity(self.planned());
        for group in &self.groups {
            for registered in group.probes() {
                let label = registered.label().to_string();
                let slot = match registered.skip_reason() {
                    Some(failure) => {
                        debug!(probe = %label, group = group.name(), "skipped: {}", failure);
                        Slot::Done(ProbeOutcome::Failure(failure.clone()), RunStatus::Skipped)
                    }
                    None => Slot::Running(spawn_probe(
                        Arc::clone(&registered.probe),
                        self.ctx.clone(),
                        Arc::clone(&semaphore),
                        probe_timeout,
                    )),
                };
                slots.push((label, slot));
            }
        }

        let mut snapshot = Snapshot::with_metadata(run_id, started_at);
        let mut stats = ProbeStats {
            planned: slots.len(),
            ..ProbeStats::default()
        };

        for (label, slot) in slots {
            let (outcome, status) = match slot {
                Slot::Done(outcome, status) => (outcome, status),
                Slot::Running(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => (
                        ProbeOutcome::Failure(ProbeFailure::runtime(format!("task failed: {}", e))),
                        RunStatus::Failed,
                    ),
                },
            };

            match status {
                RunStatus::Succeeded => stats.succeeded += 1,
                RunStatus::Failed => stats.failed += 1,
                RunStatus::TimedOut => stats.timed_out += 1,
                RunStatus::Skipped => stats.skipped += 1,
            }

            if let ProbeOutcome::Failure(failure) = &outcome {
                if status != RunStatus::Skipped {
                    warn!(probe = %label, "{}", failure);
                }
            }

            let facts: Vec<Fact> = outcome.into_facts(&label);
            snapshot.extend(facts);
        }

        snapshot.set_stats(stats);
        info!(
            "Collected {} facts in {}ms: {} succeeded, {} failed, {} timed out, {} skipped",
            snapshot.len(),
            started.elapsed().as_millis(),
            stats.succeeded,
            stats.failed,
            stats.timed_out,
            stats.skipped
        );
        snapshot
    }
}

enum Slot {
    Done(ProbeOutcome, RunStatus),
    Running(JoinHandle<(ProbeOutcome, RunStatus)>),
}

fn spawn_probe(
    probe: Arc<dyn crate::probe::Probe>,
    ctx: ProbeContext,
    semaphore: Arc<Semaphore>,
    probe_timeout: Duration,
) -> JoinHandle<(ProbeOutcome, RunStatus)> {
    tokio::spawn(async move {
        let permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                return (
                    ProbeOutcome::Failure(ProbeFailure::runtime(e.to_string())),
                    RunStatus::Failed,
                )
            }
        };

        let label = probe.label().to_string();
        let started = Instant::now();
        debug!(probe = %label, "started");

        // A timed-out job is abandoned; its slot goes back to the pool
        // when the deadline fires, not when the blocking thread returns
        let job = tokio::task::spawn_blocking(move || probe.collect(&ctx));

        let result = match timeout(probe_timeout, job).await {
            Ok(Ok(Ok(facts))) => (ProbeOutcome::Success(facts), RunStatus::Succeeded),
            Ok(Ok(Err(failure))) => (ProbeOutcome::Failure(failure), RunStatus::Failed),
            Ok(Err(join_err)) => {
                let detail = if join_err.is_panic() {
                    format!("panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    join_err.to_string()
                };
                (ProbeOutcome::Failure(ProbeFailure::runtime(detail)), RunStatus::Failed)
            }
            Err(_) => (
                ProbeOutcome::Failure(ProbeFailure::runtime(format!(
                    "timed out after {} ms",
                    probe_timeout.as_millis()
                ))),
                RunStatus::TimedOut,
            ),
        };
        drop(permit);

        debug!(
            probe = %label,
            success = result.0.is_success(),
            "finished in {}ms",
            started.elapsed().as_millis()
        );
        result
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the whole collection on the runtime and report back exactly once.
/// Must be called from within a tokio runtime.
pub fn spawn_collection(aggregator: Arc<Aggregator>) -> oneshot::Receiver<CollectionEvent> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let work = tokio::spawn(async move { aggregator.collect().await });
        let event = match work.await {
            Ok(snapshot) => CollectionEvent::SnapshotReady(snapshot),
            Err(e) => CollectionEvent::SnapshotFailed(e.to_string()),
        };
        // Receiver may have gone away; nothing else to do
        let _ = tx.send(event);
    });
    rx
}
