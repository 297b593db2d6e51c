// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dd_edge_telemetry::cli::{Args, OutputFormat};
use dd_edge_telemetry::config::{
    default_config_path, finish_config, get_log_level, read_config_file,
};
use dd_edge_telemetry::sampler::SystematicSampler;
use dd_edge_telemetry::sink::{JsonLinesSink, LogSink, SnapshotSink};
use dd_edge_telemetry::Agent;
use log::{error, info};
use simple_logger::SimpleLogger;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;

type Input = Box<dyn AsyncBufRead + Unpin + Send>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct InputStats {
    lines: u64,
    skipped: u64,
    rejected: u64,
}

async fn open_input(path: Option<&Path>) -> Result<Input> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            info!("Reading documents from {}", path.display());
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("Reading documents from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

/// Feeds every non-blank line admitted by the sampler to the agent.
async fn read_documents<R>(agent: Arc<Agent>, input: R) -> Result<InputStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut sampler = SystematicSampler::new(agent.config().sampling_rate);
    let mut stats = InputStats::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;
        if !sampler.admit() {
            stats.skipped += 1;
            continue;
        }
        if agent.ingest(&line).is_err() {
            stats.rejected += 1;
        }
    }

    Ok(stats)
}

fn flush(agent: &Agent, sink: &dyn SnapshotSink) {
    if let Err(e) = agent.flush_to(sink) {
        error!("Failed to emit snapshot: {e:#}");
    }
}

async fn run_agent(agent: Arc<Agent>, input: Input, sink: &dyn SnapshotSink) -> Result<()> {
    let period = Duration::from_secs(agent.config().flush_interval_seconds);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let mut reader = tokio::spawn(read_documents(Arc::clone(&agent), input));

    let outcome = loop {
        tokio::select! {
            _ = ticker.tick() => flush(&agent, sink),
            joined = &mut reader => {
                break match joined {
                    Ok(Ok(stats)) => {
                        info!(
                            "Input exhausted: {} documents read, {} skipped by sampling, {} rejected",
                            stats.lines, stats.skipped, stats.rejected
                        );
                        Ok(())
                    }
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(e).context("Input reader task failed"),
                };
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                reader.abort();
                break Ok(());
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                reader.abort();
                break Ok(());
            }
        }
    };

    // Whatever ended the loop, the last partial window is still reported.
    flush(&agent, sink);
    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let file_config = read_config_file(&config_path);
    let log_level = get_log_level(file_config.as_ref().ok().and_then(Option::as_ref));
    // Logs go to stderr; stdout carries the snapshots.
    SimpleLogger::new()
        .with_level(log_level.to_level_filter())
        .init()?;
    info!("Log level set to: {:?}", log_level);

    let mut config = finish_config(&config_path, file_config?);
    if let Some(seconds) = args.flush_interval {
        config.flush_interval_seconds = seconds;
    }
    let agent = Arc::new(Agent::new(config).context("Invalid edge telemetry configuration")?);

    let sink: Box<dyn SnapshotSink> = match args.output {
        OutputFormat::Log => Box::new(LogSink::default()),
        OutputFormat::Json => Box::new(JsonLinesSink::new(std::io::stdout())),
    };

    let input_path: Option<PathBuf> = args.input_path();
    let input = open_input(input_path.as_deref()).await?;

    info!("Starting edge-agent {}", agent.agent_id());
    run_agent(agent, input, sink.as_ref()).await
}
