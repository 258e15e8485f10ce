//! Command handlers

use crate::cli::{Cli, Commands};
use crate::sink::{color_enabled, ConsoleSink, DocumentSink};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sysscope_common::{
    render_with_title, spawn_collection, Aggregator, CapabilitySet, Classifier, CollectionEvent,
    Config, ProbeContext, ReportSink, SinkError, Snapshot, Value,
};
use sysscope_probes::default_groups;
use tracing::info;

/// Facts shown by `collect --summary`
pub const SUMMARY_FACTS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub summary: bool,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub color: bool,
}

/// Load configuration and dispatch
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Collect {
            summary,
            json,
            output,
            no_color,
        } => {
            let options = CollectOptions {
                summary,
                json,
                output,
                color: !no_color && color_enabled(),
            };
            collect(config, options).await
        }
        Commands::Probes => probes(config, color_enabled()),
        Commands::Config => show_config(&config),
    }
}

pub async fn collect(config: Config, options: CollectOptions) -> Result<()> {
    // Reject bad classification overrides before spending time collecting
    let classifier = Classifier::from_config(&config).context("Invalid classification rules")?;
    let report_config = config.report.clone();

    let ctx = ProbeContext::new(CapabilitySet::detect(), config);
    let groups = default_groups(&ctx);
    let aggregator = Arc::new(Aggregator::new(ctx, groups));

    let spinner = console::user_attended_stderr().then(|| create_spinner("Collecting system information..."));
    let event = spawn_collection(aggregator).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }

    let snapshot = match event {
        Ok(CollectionEvent::SnapshotReady(snapshot)) => snapshot,
        Ok(CollectionEvent::SnapshotFailed(reason)) => bail!("Collection failed: {}", reason),
        Err(_) => bail!("Collection task ended without a result"),
    };

    let stats = snapshot.stats();
    info!(
        "Collected {} facts ({} ok, {} failed, {} timed out, {} skipped)",
        snapshot.len(),
        stats.succeeded,
        stats.failed,
        stats.timed_out,
        stats.skipped
    );

    let stdout = io::stdout();
    if options.json {
        let json = snapshot.to_json_pretty().context("Failed to serialize snapshot")?;
        let mut out = stdout.lock();
        writeln!(out, "{}", json).context("Failed to write JSON")?;
    } else if options.summary {
        write_summary(&snapshot, &mut ConsoleSink::new(stdout.lock(), options.color))
            .context("Failed to write summary")?;
    } else {
        let report = classifier.classify(&snapshot);
        let mut console = ConsoleSink::new(stdout.lock(), options.color);
        render_with_title(&report, &report_config.title, &mut console)
            .context("Failed to write report")?;
    }

    if let Some(path) = &options.output {
        let report = classifier.classify(&snapshot);
        let mut document = DocumentSink::create(path, &report_config)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        render_with_title(&report, &report_config.title, &mut document)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Document written to {}", document.target().display());
    }

    // Keep stdout parseable under --json
    let done = format!("Collected {} items", snapshot.len());
    if options.json {
        eprintln!("{}", done);
    } else if options.color {
        println!("\n{}", done.green());
    } else {
        println!("\n{}", done);
    }
    Ok(())
}

/// The first facts of the snapshot, unclassified
pub fn write_summary(snapshot: &Snapshot, sink: &mut dyn ReportSink) -> Result<(), SinkError> {
    for fact in snapshot.iter().take(SUMMARY_FACTS) {
        match &fact.value {
            Value::Scalar(scalar) => sink.write_key_value(&fact.key, scalar)?,
            Value::Group(entries) => {
                for entry in entries {
                    sink.write_nested_key_value(&fact.key, &entry.key, &entry.value)?;
                }
            }
        }
    }
    sink.finish()
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// List every registered probe and whether it will run on this host
pub fn probes(config: Config, color: bool) -> Result<()> {
    let ctx = ProbeContext::new(CapabilitySet::detect(), config);
    let groups = default_groups(&ctx);
    let mut out = io::stdout().lock();

    writeln!(out, "Platform: {}", ctx.capabilities.platform.as_str())?;
    for group in &groups {
        writeln!(out, "\n[{}]", group.name())?;
        for probe in group.probes() {
            let status = match probe.skip_reason() {
                None if color => "eligible".green().to_string(),
                None => "eligible".to_string(),
                Some(failure) if color => format!("skipped ({})", failure).yellow().to_string(),
                Some(failure) => format!("skipped ({})", failure),
            };
            writeln!(out, "  {:<22} {}", probe.label(), status)?;
        }
    }
    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    let text = config.to_toml().context("Failed to serialize configuration")?;
    print!("{}", text);
    Ok(())
}
