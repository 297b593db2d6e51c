// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use thiserror::Error;

/// Why a raw payload was not aggregated. Either variant only counts toward
/// the window's total document counter.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to parse JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("document root must be an object, got {kind}")]
    NotAnObject { kind: &'static str },
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("unknown primary dimension: {name}")]
    UnknownPrimaryDimension { name: String },
    #[error("unknown conditional dimension {name} in family {family}")]
    UnknownConditionalDimension { family: String, name: String },
    #[error("dimension {name} is listed more than once in {scope}")]
    DuplicateDimension { scope: String, name: String },
    #[error("conditional family {family} has no match substrings")]
    EmptyMatchList { family: String },
    #[error("flush_interval_seconds must be greater than zero")]
    ZeroFlushInterval,
    #[error("sampling_rate must be within [0, 1], got {rate}")]
    SamplingRateOutOfRange { rate: f64 },
}
