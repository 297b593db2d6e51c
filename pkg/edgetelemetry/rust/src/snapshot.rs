// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::aggregator::{DimensionStat, ParameterMetric};
use crate::config::AgentConfig;

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub dimension_key: String,
    pub presence_count: u64,
    pub total_count: u64,
    pub presence_rate: f64,
}

impl DimensionRecord {
    fn new(dimension_key: String, stat: &DimensionStat) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let presence_rate = if stat.total_count == 0 {
            0.0
        } else {
            stat.presence_count as f64 / stat.total_count as f64
        };
        DimensionRecord {
            dimension_key,
            presence_count: stat.presence_count,
            total_count: stat.total_count,
            presence_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub path: String,
    pub presence_count: u64,
    pub total_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<Value>,
    /// Ranked by `presence_count`, highest first.
    pub dimensions: Vec<DimensionRecord>,
}

impl ParameterRecord {
    pub fn dimension(&self, key: &str) -> Option<&DimensionRecord> {
        self.dimensions.iter().find(|dim| dim.dimension_key == key)
    }
}

impl From<ParameterMetric> for ParameterRecord {
    fn from(metric: ParameterMetric) -> Self {
        let mut dimensions: Vec<DimensionRecord> = metric
            .dimensions
            .into_iter()
            .map(|(key, stat)| DimensionRecord::new(key, &stat))
            .collect();
        dimensions.sort_by(|a, b| {
            rank(a.presence_count, b.presence_count)
                .then_with(|| a.dimension_key.cmp(&b.dimension_key))
        });
        ParameterRecord {
            path: metric.path,
            presence_count: metric.presence_count,
            total_count: metric.total_count,
            sample_values: metric.samples,
            dimensions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub version: String,
    pub config: AgentConfig,
}

/// Ranked export of one window, produced by a flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub agent_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub window_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub window_end: OffsetDateTime,
    pub total_documents: u64,
    pub processed_documents: u64,
    /// Ranked by `presence_count`, highest first.
    pub parameters: Vec<ParameterRecord>,
    pub metadata: SnapshotMetadata,
}

/// Highest count first. Ties fall back to the key so output is stable.
fn rank(a: u64, b: u64) -> Ordering {
    b.cmp(&a)
}

/// Window bounds and counters captured at flush time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WindowBounds {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub total_documents: u64,
    pub processed_documents: u64,
}

impl Snapshot {
    pub(crate) fn build(
        agent_id: &str,
        config: &AgentConfig,
        window: WindowBounds,
        metrics: impl Iterator<Item = ParameterMetric>,
    ) -> Self {
        let mut parameters: Vec<ParameterRecord> = metrics.map(ParameterRecord::from).collect();
        parameters.sort_by(|a, b| {
            rank(a.presence_count, b.presence_count).then_with(|| a.path.cmp(&b.path))
        });
        Snapshot {
            agent_id: agent_id.to_string(),
            window_start: window.start,
            window_end: window.end,
            total_documents: window.total_documents,
            processed_documents: window.processed_documents,
            parameters,
            metadata: SnapshotMetadata {
                version: SNAPSHOT_VERSION.to_string(),
                config: config.clone(),
            },
        }
    }

    pub fn parameter(&self, path: &str) -> Option<&ParameterRecord> {
        self.parameters.iter().find(|param| param.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
