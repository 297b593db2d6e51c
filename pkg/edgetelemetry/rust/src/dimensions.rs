// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::combinations::Dimension;
use crate::config::{AgentConfig, ConditionalFamily};
use crate::errors::ConfigError;

/// OpenRTB `device.devicetype` codes produced by inference. Explicit codes
/// carried by a document are passed through untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceType {
    Mobile,
    Desktop,
    ConnectedTv,
}

impl DeviceType {
    pub fn code(self) -> u64 {
        match self {
            Self::Mobile => 1,
            Self::Desktop => 2,
            Self::ConnectedTv => 3,
        }
    }
}

struct DeviceTypeRule {
    name: &'static str,
    matches: fn(&Map<String, Value>) -> bool,
    device_type: DeviceType,
}

const CTV_USER_AGENT_MARKERS: &[&str] = &["smart-tv", "tizen", "roku", "androidtv"];
const MOBILE_USER_AGENT_MARKERS: &[&str] = &["mobile", "iphone"];
const TV_VENDORS: &[&str] = &["roku", "samsung", "sony"];

/// Evaluated top to bottom, first match wins. Anything unmatched is a desktop.
static DEVICE_TYPE_RULES: &[DeviceTypeRule] = &[
    DeviceTypeRule {
        name: "ctv-user-agent",
        matches: is_ctv_user_agent,
        device_type: DeviceType::ConnectedTv,
    },
    DeviceTypeRule {
        name: "mobile-user-agent",
        matches: is_mobile_user_agent,
        device_type: DeviceType::Mobile,
    },
    DeviceTypeRule {
        name: "tv-vendor-model",
        matches: is_tv_vendor_model,
        device_type: DeviceType::ConnectedTv,
    },
];

fn user_agent_contains_any(device: &Map<String, Value>, markers: &[&str]) -> bool {
    let Some(ua) = device.get("ua").and_then(Value::as_str) else {
        return false;
    };
    let ua = ua.to_lowercase();
    markers.iter().any(|marker| ua.contains(marker))
}

fn is_ctv_user_agent(device: &Map<String, Value>) -> bool {
    user_agent_contains_any(device, CTV_USER_AGENT_MARKERS)
}

fn is_mobile_user_agent(device: &Map<String, Value>) -> bool {
    user_agent_contains_any(device, MOBILE_USER_AGENT_MARKERS)
}

fn is_tv_vendor_model(device: &Map<String, Value>) -> bool {
    let Some(make) = device.get("make").and_then(Value::as_str) else {
        return false;
    };
    if !TV_VENDORS.contains(&make.to_lowercase().as_str()) {
        return false;
    }
    device
        .get("model")
        .and_then(Value::as_str)
        .is_some_and(|model| model.to_lowercase().contains("tv"))
}

pub(crate) fn infer_device_type(device: &Map<String, Value>) -> DeviceType {
    DEVICE_TYPE_RULES
        .iter()
        .find(|rule| (rule.matches)(device))
        .map(|rule| {
            log::trace!("device type inferred by rule {}", rule.name);
            rule.device_type
        })
        .unwrap_or(DeviceType::Desktop)
}

/// Walks `keys` through nested objects.
fn object_at<'a>(document: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter()
        .try_fold(document, |map, key| map.get(*key)?.as_object())
}

fn is_one(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_f64)
        .is_some_and(|v| (v - 1.0).abs() < f64::EPSILON)
}

/// Dimensions computed once per document, independent of the path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimaryDimension {
    DeviceType,
    Country,
    RequestType,
    Hour,
}

impl PrimaryDimension {
    pub const ALL: [Self; 4] = [Self::DeviceType, Self::Country, Self::RequestType, Self::Hour];

    pub fn name(self) -> &'static str {
        match self {
            Self::DeviceType => "device_type",
            Self::Country => "country",
            Self::RequestType => "request_type",
            Self::Hour => "hour",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dim| dim.name() == name)
    }

    /// `hour` is the UTC hour (0 to 23) of the ingestion call, not a
    /// timestamp read from the document.
    pub fn extract(self, document: &Map<String, Value>, hour: u8) -> Option<Value> {
        match self {
            Self::DeviceType => {
                let device = object_at(document, &["device"])?;
                Some(match device.get("devicetype") {
                    Some(explicit) => explicit.clone(),
                    None => Value::from(infer_device_type(device).code()),
                })
            }
            Self::Country => object_at(document, &["device", "geo"])?
                .get("country")
                .cloned(),
            Self::RequestType => {
                let kind = if document.contains_key("app") {
                    "app"
                } else if document.contains_key("site") {
                    "site"
                } else {
                    "unknown"
                };
                Some(Value::from(kind))
            }
            Self::Hour => Some(Value::from(hour)),
        }
    }
}

/// Dimensions attached only to paths matched by a conditional family.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConditionalDimension {
    HasUserId,
    HasEids,
    ContentType,
    HasSeriesInfo,
    VideoPlacement,
    VideoSkippable,
    DeviceMake,
    HasIfa,
}

impl ConditionalDimension {
    pub const ALL: [Self; 8] = [
        Self::HasUserId,
        Self::HasEids,
        Self::ContentType,
        Self::HasSeriesInfo,
        Self::VideoPlacement,
        Self::VideoSkippable,
        Self::DeviceMake,
        Self::HasIfa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::HasUserId => "has_user_id",
            Self::HasEids => "has_eids",
            Self::ContentType => "content_type",
            Self::HasSeriesInfo => "has_series_info",
            Self::VideoPlacement => "video_placement",
            Self::VideoSkippable => "video_skippable",
            Self::DeviceMake => "device_make",
            Self::HasIfa => "has_ifa",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dim| dim.name() == name)
    }

    pub fn extract(self, document: &Map<String, Value>) -> Value {
        match self {
            Self::HasUserId => Value::from(
                object_at(document, &["user"]).is_some_and(|user| user.contains_key("id")),
            ),
            Self::HasEids => Value::from(
                object_at(document, &["user", "ext"])
                    .and_then(|ext| ext.get("eids"))
                    .and_then(Value::as_array)
                    .is_some_and(|eids| !eids.is_empty()),
            ),
            Self::ContentType => Value::from(content_type(document)),
            Self::HasSeriesInfo => Value::from(
                object_at(document, &["app", "content"])
                    .is_some_and(|content| content.contains_key("series")),
            ),
            Self::VideoPlacement => Value::from(video_placement(document)),
            Self::VideoSkippable => {
                Value::from(is_one(first_video(document).and_then(|video| video.get("skip"))))
            }
            Self::DeviceMake => Value::from(
                object_at(document, &["device"])
                    .and_then(|device| device.get("make"))
                    .and_then(Value::as_str)
                    .map(str::to_lowercase)
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            Self::HasIfa => Value::from(
                object_at(document, &["device"]).is_some_and(|device| device.contains_key("ifa")),
            ),
        }
    }
}

fn content_type(document: &Map<String, Value>) -> &'static str {
    if let Some(content) = object_at(document, &["app", "content"]) {
        return if is_one(content.get("livestream")) {
            "live"
        } else {
            "vod"
        };
    }
    if object_at(document, &["site"]).is_some_and(|site| site.contains_key("content")) {
        return "article";
    }
    "unknown"
}

fn first_video(document: &Map<String, Value>) -> Option<&Map<String, Value>> {
    document
        .get("imp")?
        .as_array()?
        .first()?
        .as_object()?
        .get("video")?
        .as_object()
}

#[allow(clippy::cast_possible_truncation)]
fn video_placement(document: &Map<String, Value>) -> &'static str {
    let Some(placement) = first_video(document)
        .and_then(|video| video.get("placement"))
        .and_then(Value::as_f64)
    else {
        return "unknown";
    };
    match placement as i64 {
        1 => "in-stream",
        2 => "in-banner",
        3 => "in-article",
        4 => "in-feed",
        _ => "other",
    }
}

#[derive(Debug, Clone)]
struct ResolvedFamily {
    matches: Vec<String>,
    dimensions: Vec<ConditionalDimension>,
}

impl ResolvedFamily {
    fn resolve(family: &ConditionalFamily) -> Result<Self, ConfigError> {
        if family.matches.is_empty() {
            return Err(ConfigError::EmptyMatchList {
                family: family.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        let mut dimensions = Vec::with_capacity(family.dimensions.len());
        for name in &family.dimensions {
            let dim = ConditionalDimension::from_name(name).ok_or_else(|| {
                ConfigError::UnknownConditionalDimension {
                    family: family.name.clone(),
                    name: name.clone(),
                }
            })?;
            if !seen.insert(dim) {
                return Err(ConfigError::DuplicateDimension {
                    scope: format!("conditional family {}", family.name),
                    name: name.clone(),
                });
            }
            dimensions.push(dim);
        }
        Ok(Self {
            matches: family.matches.clone(),
            dimensions,
        })
    }

    fn applies_to(&self, path: &str) -> bool {
        self.matches.iter().any(|needle| path.contains(needle.as_str()))
    }
}

/// The dimension extractors selected by configuration, in generation order.
#[derive(Debug, Clone)]
pub struct DimensionPlan {
    primary: Vec<PrimaryDimension>,
    families: Vec<ResolvedFamily>,
}

impl DimensionPlan {
    pub fn from_config(config: &AgentConfig) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut primary = Vec::with_capacity(config.primary_dimensions.len());
        for name in &config.primary_dimensions {
            let dim = PrimaryDimension::from_name(name).ok_or_else(|| {
                ConfigError::UnknownPrimaryDimension { name: name.clone() }
            })?;
            if !seen.insert(dim) {
                return Err(ConfigError::DuplicateDimension {
                    scope: "primary_dimensions".to_string(),
                    name: name.clone(),
                });
            }
            primary.push(dim);
        }

        let families = config
            .conditional_dimensions
            .iter()
            .map(ResolvedFamily::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { primary, families })
    }

    /// Primary dimensions present in `document`, in configured order.
    pub fn primary(&self, document: &Map<String, Value>, hour: u8) -> Vec<Dimension> {
        self.primary
            .iter()
            .filter_map(|dim| {
                dim.extract(document, hour)
                    .map(|value| Dimension::new(dim.name(), value))
            })
            .collect()
    }

    /// Conditional dimensions of the first family whose match list hits
    /// `path`, or nothing when no family applies.
    pub fn conditional(&self, document: &Map<String, Value>, path: &str) -> Vec<Dimension> {
        let Some(family) = self.families.iter().find(|family| family.applies_to(path)) else {
            return Vec::new();
        };
        family
            .dimensions
            .iter()
            .map(|dim| Dimension::new(dim.name(), dim.extract(document)))
            .collect()
    }
}
