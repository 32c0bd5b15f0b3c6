//! Normalized metric points produced from DOCSIS channel listings
//!
//! A [`MetricPoint`] is one observation for one channel:
//! - identifying dimensions as string tags (channel id, direction, version...)
//! - measured quantities as typed fields
//! - the shared timestamp of the poll cycle that produced it
//!
//! Points without fields cannot be constructed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Default measurement name written by the agent
pub const DEFAULT_MEASUREMENT: &str = "docsis_channel_metrics";

/// Channel direction as seen from the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Downstream,
    Upstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Downstream => "downstream",
            Direction::Upstream => "upstream",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DOCSIS protocol version of a channel list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocsisVersion {
    #[serde(rename = "3.0")]
    V30,
    #[serde(rename = "3.1")]
    V31,
}

impl DocsisVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocsisVersion::V30 => "3.0",
            DocsisVersion::V31 => "3.1",
        }
    }
}

impl fmt::Display for DocsisVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value stored in a metric field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

pub type Tags = BTreeMap<String, String>;
pub type Fields = BTreeMap<String, FieldValue>;

/// One timestamped, tagged observation ready for a metrics sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    measurement: String,
    timestamp: DateTime<Utc>,
    tags: Tags,
    fields: Fields,
}

impl MetricPoint {
    /// Build a point from fully extracted tags and fields.
    ///
    /// Returns `None` when `fields` is empty: a point with tags only carries
    /// no measurement and is never emitted.
    pub fn new(
        measurement: impl Into<String>,
        timestamp: DateTime<Utc>,
        tags: Tags,
        fields: Fields,
    ) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            measurement: measurement.into(),
            timestamp,
            tags,
            fields,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}
