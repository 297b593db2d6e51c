// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashMap;

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::combinations::DimensionTuple;
use crate::config::AgentConfig;
use crate::schema;

/// Hard cardinality caps. Anything past a cap is dropped without a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_parameters: usize,
    pub max_dimension_combos: usize,
    pub max_sample_values: usize,
}

impl Limits {
    pub fn from_config(config: &AgentConfig) -> Self {
        Limits {
            max_parameters: config.max_parameters,
            max_dimension_combos: config.max_dimension_combos,
            max_sample_values: config.max_sample_values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionStat {
    pub presence_count: u64,
    pub total_count: u64,
    pub first_seen: OffsetDateTime,
    pub last_seen: OffsetDateTime,
}

impl DimensionStat {
    fn new(now: OffsetDateTime) -> Self {
        DimensionStat {
            presence_count: 0,
            total_count: 0,
            first_seen: now,
            last_seen: now,
        }
    }

    fn observe(&mut self, now: OffsetDateTime) {
        self.presence_count += 1;
        self.total_count += 1;
        self.last_seen = now;
    }
}

/// Window-scoped statistics for one parameter path.
#[derive(Debug, Clone)]
pub struct ParameterMetric {
    pub(crate) path: String,
    pub(crate) presence_count: u64,
    pub(crate) total_count: u64,
    pub(crate) last_seen: OffsetDateTime,
    pub(crate) samples: Vec<Value>,
    pub(crate) dimensions: HashMap<String, DimensionStat>,
}

impl ParameterMetric {
    fn new(path: &str, now: OffsetDateTime) -> Self {
        ParameterMetric {
            path: path.to_string(),
            presence_count: 0,
            total_count: 0,
            last_seen: now,
            samples: Vec::new(),
            dimensions: HashMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn presence_count(&self) -> u64 {
        self.presence_count
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn last_seen(&self) -> OffsetDateTime {
        self.last_seen
    }

    /// Values captured first-come, first-kept within the window.
    pub fn samples(&self) -> &[Value] {
        &self.samples
    }

    pub fn dimensions(&self) -> &HashMap<String, DimensionStat> {
        &self.dimensions
    }

    /// Counts each tuple under its canonical key. New keys past
    /// `max_dimension_combos` are dropped; known keys keep counting.
    pub fn record_dimensions(
        &mut self,
        tuples: &[DimensionTuple],
        max_dimension_combos: usize,
        now: OffsetDateTime,
    ) {
        for tuple in tuples {
            let key = tuple.key();
            if let Some(stat) = self.dimensions.get_mut(&key) {
                stat.observe(now);
                continue;
            }
            if self.dimensions.len() >= max_dimension_combos {
                continue;
            }
            self.dimensions
                .entry(key)
                .or_insert_with(|| DimensionStat::new(now))
                .observe(now);
        }
    }
}

/// Path to metric mapping for the current window.
#[derive(Debug)]
pub struct Aggregator {
    limits: Limits,
    metrics: HashMap<String, ParameterMetric>,
}

impl Aggregator {
    pub fn new(limits: Limits) -> Self {
        Aggregator {
            limits,
            metrics: HashMap::new(),
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&ParameterMetric> {
        self.metrics.get(path)
    }

    /// Counts one presence of `path` in `document`.
    ///
    /// Returns `None` without any side effect when `path` is new and the
    /// aggregator already tracks `max_parameters` paths.
    pub fn record_path(
        &mut self,
        document: &Map<String, Value>,
        path: &str,
        now: OffsetDateTime,
    ) -> Option<&mut ParameterMetric> {
        if !self.metrics.contains_key(path) {
            if self.metrics.len() >= self.limits.max_parameters {
                return None;
            }
            self.metrics
                .insert(path.to_string(), ParameterMetric::new(path, now));
        }
        let max_sample_values = self.limits.max_sample_values;
        let metric = self.metrics.get_mut(path)?;

        metric.presence_count += 1;
        metric.total_count += 1;
        metric.last_seen = now;

        if metric.samples.len() < max_sample_values
            && let Some(value) = schema::value_at(document, path)
            && !value.is_null()
        {
            metric.samples.push(value.clone());
        }

        Some(metric)
    }

    /// Empties the aggregator, yielding every tracked metric.
    pub fn drain(&mut self) -> impl Iterator<Item = ParameterMetric> + '_ {
        self.metrics.drain().map(|(_, metric)| metric)
    }
}
