use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use colored::Colorize;
use serde_json::{json, Value};
use storesync::{
    BroadcastReport, DefaultDispatcher, DispatchReport, Envelope, EventPublisher, JsonCodec, JsonDocumentStore,
    MessageDispatcher, PublishError, PublishResult, PublisherHub, StoreRegistry, SyncConfig,
};

use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => SyncConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SyncConfig::default(),
    };
    match cli.command {
        Command::Replay(args) => cmd_replay(args, &config, cli.format),
        Command::Encode(args) => cmd_encode(args, &config, cli.format),
    }
}

/// Tally of one replay run plus the final mirror contents.
#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub messages: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dropped: usize,
    pub unmatched: usize,
    pub entries: Vec<(String, Value)>,
}

impl ReplaySummary {
    fn record(&mut self, report: &DispatchReport) {
        self.messages += 1;
        if report.is_dropped() {
            self.dropped += 1;
        } else if report.is_unmatched() {
            self.unmatched += 1;
        }
        self.applied += report.applied();
        self.skipped += report.skipped();
        self.failed += report.failed();
    }
}

/// Dispatch every non-empty line of `reader` into a fresh mirror.
pub fn replay<R: BufRead>(
    reader: R,
    stream: &str,
    key: &str,
    config: &SyncConfig,
) -> anyhow::Result<ReplaySummary> {
    let registry = Arc::new(StoreRegistry::new());
    let mirror = Arc::new(JsonDocumentStore::keyed_by_field(stream, key));
    registry.register(mirror.clone());
    let dispatcher = DefaultDispatcher::with_config(registry, config.dispatcher.clone());

    let mut summary = ReplaySummary::default();
    for line in reader.lines() {
        let line = line.context("reading input")?;
        if line.trim().is_empty() {
            continue;
        }
        let report = dispatcher.dispatch(&line);
        if let Some(reason) = report.drop_reason() {
            debug!(line = summary.messages + 1, %reason, "input line dropped");
        }
        summary.record(&report);
    }

    let mut entries = mirror.snapshot();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    summary.entries = entries;
    Ok(summary)
}

fn cmd_replay(args: ReplayArgs, config: &SyncConfig, format: OutputFormat) -> anyhow::Result<()> {
    let summary = match &args.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            replay(BufReader::new(file), &args.stream, &args.key, config)?
        }
        None => replay(io::stdin().lock(), &args.stream, &args.key, config)?,
    };

    match format {
        OutputFormat::Json => {
            let entries: serde_json::Map<String, Value> = summary.entries.iter().cloned().collect();
            let out = json!({
                "stream": args.stream,
                "messages": summary.messages,
                "applied": summary.applied,
                "skipped": summary.skipped,
                "failed": summary.failed,
                "dropped": summary.dropped,
                "unmatched": summary.unmatched,
                "entries": entries,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{} Replayed {} messages into {}",
                "✓".green().bold(),
                summary.messages.to_string().bold(),
                args.stream.cyan()
            );
            println!("  Applied: {}", summary.applied.to_string().green());
            println!("  Skipped: {}", summary.skipped);
            println!("  Failed: {}", summary.failed.to_string().red());
            println!("  Dropped: {}", summary.dropped.to_string().yellow());
            println!("  Unmatched: {}", summary.unmatched);
            println!("\n{} entries:", summary.entries.len().to_string().bold());
            for (key, value) in &summary.entries {
                println!("  {} {}", key.yellow(), value);
            }
        }
    }
    Ok(())
}

/// Sink writing each envelope's wire form as one line.
pub struct WriterPublisher<W: Write + Send> {
    name: String,
    out: Mutex<W>,
}

impl<W: Write + Send> WriterPublisher<W> {
    pub fn new(name: impl Into<String>, out: W) -> Self {
        Self {
            name: name.into(),
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> EventPublisher for WriterPublisher<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, envelope: &Envelope<String>) -> PublishResult<()> {
        let wire = JsonCodec::encode_envelope(envelope)?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{wire}").map_err(|e| PublishError::Transport(e.to_string()))
    }
}

/// Broadcast one envelope built from CLI arguments through `hub`.
pub fn encode(args: &EncodeArgs, hub: &PublisherHub) -> anyhow::Result<BroadcastReport> {
    let value: Value = serde_json::from_str(&args.data).context("--data is not valid JSON")?;
    Ok(hub.send_event(&args.stream, args.kind.into(), &value)?)
}

/// Describe a broadcast for stderr. Stdout carries only the wire lines.
pub fn render_broadcast(
    hub: &PublisherHub,
    report: &BroadcastReport,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let sinks: Vec<&str> = hub.publishers().iter().map(|p| p.name()).collect();
    match format {
        OutputFormat::Json => {
            let failed: serde_json::Map<String, Value> = report
                .failed
                .iter()
                .map(|(sink, e)| (sink.clone(), Value::String(e.to_string())))
                .collect();
            let out = json!({
                "sinks": sinks,
                "failure_policy": hub.config().failure_policy,
                "delivered": report.delivered,
                "failed": failed,
            });
            Ok(serde_json::to_string_pretty(&out)?)
        }
        OutputFormat::Text => {
            let mut out = format!(
                "{} Delivered to {}/{} sinks",
                "✓".green().bold(),
                report.delivered,
                sinks.len()
            );
            for (sink, error) in &report.failed {
                out.push_str(&format!("\n{} {}: {}", "✗".red().bold(), sink, error));
            }
            Ok(out)
        }
    }
}

fn cmd_encode(args: EncodeArgs, config: &SyncConfig, format: OutputFormat) -> anyhow::Result<()> {
    let stdout: Arc<dyn EventPublisher> = Arc::new(WriterPublisher::new("stdout", io::stdout()));
    let hub = PublisherHub::with_config(vec![stdout], config.hub.clone());
    let report = encode(&args, &hub)?;
    eprintln!("{}", render_broadcast(&hub, &report, format)?);
    Ok(())
}
