// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use log::info;
use serde_json::Value;

use crate::snapshot::Snapshot;

/// Receives each snapshot after the agent lock has been released.
pub trait SnapshotSink: Send + Sync {
    fn emit(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Human readable report through the `log` facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSink {
    /// Parameters listed with their presence.
    pub top_parameters: usize,
    /// Parameters reported with samples and dimensions.
    pub detailed_parameters: usize,
    pub samples_per_parameter: usize,
    pub dimensions_per_parameter: usize,
}

impl Default for LogSink {
    fn default() -> Self {
        LogSink {
            top_parameters: 15,
            detailed_parameters: 5,
            samples_per_parameter: 3,
            dimensions_per_parameter: 5,
        }
    }
}

impl LogSink {
    /// The report as lines, in emission order.
    pub fn render(&self, snapshot: &Snapshot) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Snapshot from {} for window {} .. {}",
                snapshot.agent_id, snapshot.window_start, snapshot.window_end
            ),
            format!(
                "Documents: {} received, {} processed, {} parameters tracked",
                snapshot.total_documents,
                snapshot.processed_documents,
                snapshot.parameters.len()
            ),
        ];

        if snapshot.is_empty() {
            lines.push("No parameters observed".to_string());
            return lines;
        }

        lines.push(format!("Top {} parameters:", self.top_parameters));
        for (rank, param) in snapshot
            .parameters
            .iter()
            .take(self.top_parameters)
            .enumerate()
        {
            lines.push(format!(
                "{:>3}. {} (presence {}, {:.1}% of processed)",
                rank + 1,
                param.path,
                param.presence_count,
                percentage(param.presence_count, snapshot.processed_documents)
            ));
        }

        for param in snapshot.parameters.iter().take(self.detailed_parameters) {
            lines.push(format!("Parameter {}:", param.path));
            let samples: Vec<String> = param
                .sample_values
                .iter()
                .take(self.samples_per_parameter)
                .map(Value::to_string)
                .collect();
            if !samples.is_empty() {
                lines.push(format!("  samples: {}", samples.join(", ")));
            }
            for dim in param.dimensions.iter().take(self.dimensions_per_parameter) {
                lines.push(format!(
                    "  {} count={} rate={:.2}",
                    dim.dimension_key, dim.presence_count, dim.presence_rate
                ));
            }
        }

        lines
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(count: u64, of: u64) -> f64 {
    if of == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / of as f64
}

impl SnapshotSink for LogSink {
    fn emit(&self, snapshot: &Snapshot) -> Result<()> {
        for line in self.render(snapshot) {
            info!("{line}");
        }
        Ok(())
    }
}

/// Writes every snapshot as one compact JSON line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> SnapshotSink for JsonLinesSink<W> {
    fn emit(&self, snapshot: &Snapshot) -> Result<()> {
        let mut line = serde_json::to_vec(snapshot).context("serializing snapshot")?;
        line.push(b'\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line).context("writing snapshot")?;
        writer.flush().context("flushing snapshot writer")
    }
}
