// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Where flushed snapshots go.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable report through the logger
    #[default]
    Log,
    /// One JSON snapshot per line on stdout
    Json,
}

#[derive(Parser, Debug, PartialEq)]
#[command(name = "edge-agent")]
#[command(about = "Edge telemetry agent - windowed parameter presence statistics over JSON documents", long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Newline-delimited JSON input, `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Snapshot output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Log)]
    pub output: OutputFormat,

    /// Overrides `flush_interval_seconds` from the configuration
    #[arg(long)]
    pub flush_interval: Option<u64>,
}

impl Args {
    /// The input file, or `None` when reading stdin.
    pub fn input_path(&self) -> Option<PathBuf> {
        (self.input != "-").then(|| PathBuf::from(&self.input))
    }
}
