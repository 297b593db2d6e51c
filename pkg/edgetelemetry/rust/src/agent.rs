// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use serde_json::{Map, Value};
use time::{OffsetDateTime, UtcOffset};

use crate::aggregator::{Aggregator, Limits};
use crate::combinations::generate_combinations;
use crate::config::AgentConfig;
use crate::dimensions::DimensionPlan;
use crate::errors::{ConfigError, IngestError};
use crate::schema;
use crate::sink::SnapshotSink;
use crate::snapshot::{Snapshot, WindowBounds};

/// Everything mutated by ingestion and flush. Only reachable through
/// [`Agent::lock`], so ingestions and flushes never interleave.
#[derive(Debug)]
struct WindowState {
    aggregator: Aggregator,
    window_start: OffsetDateTime,
    total_documents: u64,
    processed_documents: u64,
}

impl WindowState {
    fn new(limits: Limits, now: OffsetDateTime) -> Self {
        WindowState {
            aggregator: Aggregator::new(limits),
            window_start: now,
            total_documents: 0,
            processed_documents: 0,
        }
    }
}

/// A read-only view of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    pub tracked_parameters: usize,
    pub total_documents: u64,
    pub processed_documents: u64,
    pub window_start: OffsetDateTime,
}

/// Windowed presence statistics over schemaless documents.
///
/// A single coarse lock guards the whole window. A call to [`Agent::ingest`]
/// holds it for the full decode and walk, [`Agent::flush`] holds it while
/// building the snapshot and resetting. The agent never flushes by itself;
/// the caller owns the cadence.
#[derive(Debug)]
pub struct Agent {
    agent_id: String,
    config: AgentConfig,
    plan: DimensionPlan,
    state: Mutex<WindowState>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let plan = DimensionPlan::from_config(&config)?;
        let now = OffsetDateTime::now_utc();
        let agent_id = config
            .agent_id
            .clone()
            .unwrap_or_else(|| format!("agent-{}", now.unix_timestamp()));

        info!(
            "Edge telemetry agent {agent_id} tracking up to {} parameters, {} combinations each",
            config.max_parameters, config.max_dimension_combos
        );

        Ok(Agent {
            agent_id,
            state: Mutex::new(WindowState::new(Limits::from_config(&config), now)),
            config,
            plan,
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    // Every critical section leaves the state consistent, so a panic in
    // another holder does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingests one raw JSON document.
    ///
    /// Every call counts toward the window's total. A payload that does not
    /// decode to an object counts toward nothing else.
    pub fn ingest(&self, raw: &str) -> Result<(), IngestError> {
        self.ingest_at(raw, OffsetDateTime::now_utc())
    }

    /// Like [`Agent::ingest`], with `now` as the processing time. The `hour`
    /// dimension is taken from `now` in UTC.
    pub fn ingest_at(&self, raw: &str, now: OffsetDateTime) -> Result<(), IngestError> {
        let mut state = self.lock();
        state.total_documents += 1;

        let document = parse_document(raw).inspect_err(|e| {
            debug!("Dropping undecodable document: {e}");
        })?;
        state.processed_documents += 1;

        let primary = self.plan.primary(&document, now.to_offset(UtcOffset::UTC).hour());
        let max_dimension_combos = state.aggregator.limits().max_dimension_combos;
        let paths = schema::walk(&document, self.config.max_walk_depth);
        let mut seen = HashSet::with_capacity(paths.len());

        for path in &paths {
            if !seen.insert(path.as_str()) {
                continue;
            }
            let Some(metric) = state.aggregator.record_path(&document, path, now) else {
                continue;
            };
            let conditional = self.plan.conditional(&document, path);
            let tuples = generate_combinations(&primary, &conditional);
            metric.record_dimensions(&tuples, max_dimension_combos, now);
        }

        Ok(())
    }

    /// Drains the window into a ranked snapshot and starts a new one.
    pub fn flush(&self) -> Snapshot {
        self.flush_at(OffsetDateTime::now_utc())
    }

    /// Like [`Agent::flush`], with `now` closing the window.
    pub fn flush_at(&self, now: OffsetDateTime) -> Snapshot {
        let mut state = self.lock();
        let window = WindowBounds {
            start: state.window_start,
            end: now,
            total_documents: state.total_documents,
            processed_documents: state.processed_documents,
        };
        let snapshot = Snapshot::build(
            &self.agent_id,
            &self.config,
            window,
            state.aggregator.drain(),
        );
        state.window_start = now;
        state.total_documents = 0;
        state.processed_documents = 0;
        drop(state);

        debug!(
            "Flushed window with {} parameters from {} documents",
            snapshot.parameters.len(),
            snapshot.processed_documents
        );
        snapshot
    }

    /// Flushes, then hands the snapshot to `sink` once the lock is released.
    ///
    /// A sink error is returned as is; the window has already been reset.
    pub fn flush_to(&self, sink: &dyn SnapshotSink) -> anyhow::Result<()> {
        let snapshot = self.flush();
        sink.emit(&snapshot)
    }

    pub fn stats(&self) -> WindowStats {
        let state = self.lock();
        WindowStats {
            tracked_parameters: state.aggregator.len(),
            total_documents: state.total_documents,
            processed_documents: state.processed_documents,
            window_start: state.window_start,
        }
    }
}

fn parse_document(raw: &str) -> Result<Map<String, Value>, IngestError> {
    match serde_json::from_str(raw)? {
        Value::Object(document) => Ok(document),
        other => Err(IngestError::NotAnObject {
            kind: value_kind(&other),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
