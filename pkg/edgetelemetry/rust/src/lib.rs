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

mod agent;
mod aggregator;
pub mod cli;
mod combinations;
pub mod config;
mod dimensions;
mod errors;
pub mod sampler;
pub mod schema;
pub mod sink;
mod snapshot;

// Re-export the public API
pub use agent::{Agent, WindowStats};
pub use aggregator::{Aggregator, DimensionStat, Limits, ParameterMetric};
pub use combinations::{Dimension, DimensionTuple, generate_combinations};
pub use config::{AgentConfig, ConditionalFamily};
pub use dimensions::{ConditionalDimension, DeviceType, DimensionPlan, PrimaryDimension};
pub use errors::{ConfigError, IngestError};
pub use sampler::SystematicSampler;
pub use sink::{JsonLinesSink, LogSink, SnapshotSink};
pub use snapshot::{DimensionRecord, ParameterRecord, Snapshot, SnapshotMetadata};
