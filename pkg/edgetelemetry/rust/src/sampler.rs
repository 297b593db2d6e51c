// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Caller-side admission for the advisory `sampling_rate`.

/// Deterministic systematic sampler.
///
/// Each document adds `rate` to an accumulator and is admitted whenever the
/// accumulator reaches one, so over `n` documents `floor(n * rate)` are kept
/// and they are spread evenly through the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SystematicSampler {
    rate: f64,
    accumulator: f64,
}

impl SystematicSampler {
    /// `rate` is clamped to `[0, 1]`; a NaN rate admits nothing.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        SystematicSampler {
            rate,
            accumulator: 0.0,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn admit(&mut self) -> bool {
        if self.rate >= 1.0 {
            return true;
        }
        self.accumulator += self.rate;
        // Tolerate float drift so that e.g. ten steps of 0.1 admit once.
        if self.accumulator + 1e-9 >= 1.0 {
            self.accumulator -= 1.0;
            return true;
        }
        false
    }
}
