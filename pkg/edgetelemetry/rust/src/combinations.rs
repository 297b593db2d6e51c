// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use serde_json::Value;

/// Primary dimensions that anchor the three-member tuples.
const TRIPLE_ANCHORS: [&str; 2] = ["device_type", "request_type"];

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: &'static str,
    pub value: Value,
}

impl Dimension {
    pub fn new(name: &'static str, value: Value) -> Self {
        Dimension { name, value }
    }

    /// `name:value`, with strings rendered without quotes.
    pub fn render(&self) -> String {
        format!("{}:{}", self.name, display_value(&self.value))
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An ordered 1 to 3 member combination of dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionTuple {
    members: Vec<Dimension>,
}

impl DimensionTuple {
    fn from_members(members: &[&Dimension]) -> Self {
        DimensionTuple {
            members: members.iter().map(|&dim| dim.clone()).collect(),
        }
    }

    pub fn members(&self) -> &[Dimension] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Canonical aggregation key: members rendered in tuple order, joined by `|`.
    pub fn key(&self) -> String {
        self.members
            .iter()
            .map(Dimension::render)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Builds every tuple tracked for one (document, path) observation.
///
/// 1. one single per primary dimension (conditional ones never stand alone),
/// 2. one pair per primary x conditional,
/// 3. when at least two conditional dimensions exist, one triple per anchor
///    present in `primary`, completed with the two conditional dimensions
///    whose names sort first.
pub fn generate_combinations(primary: &[Dimension], conditional: &[Dimension]) -> Vec<DimensionTuple> {
    let mut tuples =
        Vec::with_capacity(primary.len() * (1 + conditional.len()) + TRIPLE_ANCHORS.len());

    tuples.extend(primary.iter().map(|p| DimensionTuple::from_members(&[p])));

    for p in primary {
        tuples.extend(
            conditional
                .iter()
                .map(|c| DimensionTuple::from_members(&[p, c])),
        );
    }

    let mut by_name: Vec<&Dimension> = conditional.iter().collect();
    by_name.sort_by_key(|dim| dim.name);
    if let [first, second, ..] = by_name.as_slice() {
        for anchor in TRIPLE_ANCHORS {
            if let Some(p) = primary.iter().find(|dim| dim.name == anchor) {
                tuples.push(DimensionTuple::from_members(&[p, *first, *second]));
            }
        }
    }

    tuples
}
