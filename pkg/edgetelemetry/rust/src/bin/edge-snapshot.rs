// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dd_edge_telemetry::config::load_config;
use dd_edge_telemetry::{Agent, Snapshot};

#[derive(Parser, Debug)]
#[command(name = "edge-snapshot")]
#[command(about = "Edge telemetry tool - prints the parameter presence snapshot of JSON documents", long_about = None)]
struct Args {
    /// Newline-delimited JSON files to ingest
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Treat each file as a single (possibly multi-line) JSON document
    #[arg(long)]
    whole_file: bool,
}

fn snapshot(args: &Args) -> Result<(Snapshot, u64)> {
    let config = load_config(args.config.clone())?;
    let agent = Agent::new(config).context("Invalid edge telemetry configuration")?;
    let mut rejected = 0;

    for path in &args.files {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let documents: Vec<&str> = if args.whole_file {
            vec![contents.as_str()]
        } else {
            contents.lines().filter(|l| !l.trim().is_empty()).collect()
        };
        for document in documents {
            if agent.ingest(document).is_err() {
                rejected += 1;
            }
        }
    }

    Ok((agent.flush(), rejected))
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn main() -> ExitCode {
    let args = Args::parse();

    let (snapshot, rejected) = match snapshot(&args) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    if rejected > 0 {
        eprintln!("{rejected} documents could not be parsed");
    }

    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing snapshot: {}", e);
            ExitCode::FAILURE
        }
    }
}
