//! Channel listing → metric points
//!
//! Walks the four channel lists of a [`DocInfo`] in fixed order (downstream
//! 3.0, downstream 3.1, upstream 3.0, upstream 3.1) and turns every channel
//! into one [`MetricPoint`]. Which fields are read depends on direction and
//! DOCSIS version:
//!
//! | field             | applies to                 | coercion            |
//! |-------------------|----------------------------|---------------------|
//! | `power_level`     | all                        | numeric-with-locale |
//! | `corr_errors`     | all                        | integer-via-float   |
//! | `non_corr_errors` | all                        | integer-via-float   |
//! | `mse`             | downstream                 | numeric-with-locale |
//! | `latency`         | downstream 3.0             | numeric-with-locale |
//! | `mer`             | downstream 3.1             | numeric-with-locale |
//! | `plc`             | downstream 3.1             | integer-via-float   |
//! | `fft`             | 3.1                        | as-is               |
//! | `multiplex`       | upstream 3.0               | as-is               |
//! | `activesub`       | upstream 3.1               | integer-via-float   |
//!
//! A channel that yields no field, or whose values have an unexpected
//! shape, is skipped with an [`ExtractionWarning`]; the rest of the batch is
//! still mapped.

use crate::coerce::{integer_via_float, numeric_with_locale};
use crate::docinfo::{DocInfo, CHANNEL_LISTS};
use crate::metrics::{
    Direction, DocsisVersion, FieldValue, Fields, MetricPoint, Tags, DEFAULT_MEASUREMENT,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// Why a channel was left out of the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// Nothing measurable could be read from the channel
    NoFields,
    /// A value had a shape the mapper cannot use
    Extraction(String),
}

/// Non-fatal data-quality report for one skipped channel
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionWarning {
    pub channel_id: Option<String>,
    pub direction: Direction,
    pub version: DocsisVersion,
    pub kind: WarningKind,
    /// Raw channel JSON, kept for extraction failures
    pub raw: Option<String>,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.channel_id.as_deref().unwrap_or("Unknown");
        match &self.kind {
            WarningKind::NoFields => write!(
                f,
                "no valid fields for channel ID {} ({}/{}), point dropped",
                id, self.direction, self.version
            ),
            WarningKind::Extraction(reason) => write!(
                f,
                "error processing channel ({}/{}, ID {}): {}",
                self.direction, self.version, id, reason
            ),
        }
    }
}

/// Points plus the warnings raised while producing them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedBatch {
    pub points: Vec<MetricPoint>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Normalizes router channel listings into metric points.
///
/// Stateless: the same payload and timestamp always give the same batch.
#[derive(Debug, Clone)]
pub struct ChannelMetricsMapper {
    measurement: String,
}

impl Default for ChannelMetricsMapper {
    fn default() -> Self {
        Self::new(DEFAULT_MEASUREMENT)
    }
}

impl ChannelMetricsMapper {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Map a payload to points stamped with `captured_at`.
    ///
    /// Warnings are logged and dropped; use [`Self::map_detailed`] to keep them.
    pub fn map(&self, payload: &DocInfo, captured_at: DateTime<Utc>) -> Vec<MetricPoint> {
        self.map_detailed(payload, captured_at).points
    }

    pub fn map_detailed(&self, payload: &DocInfo, captured_at: DateTime<Utc>) -> MappedBatch {
        let mut batch = MappedBatch::default();

        for (direction, version) in CHANNEL_LISTS {
            for channel in payload.channels(direction, version) {
                match self.map_channel(channel, direction, version, captured_at) {
                    Ok(Some(point)) => batch.points.push(point),
                    Ok(None) => {
                        let warning = ExtractionWarning {
                            channel_id: channel_label(channel),
                            direction,
                            version,
                            kind: WarningKind::NoFields,
                            raw: None,
                        };
                        warn!("{}", warning);
                        batch.warnings.push(warning);
                    }
                    Err(reason) => {
                        let warning = ExtractionWarning {
                            channel_id: channel_label(channel),
                            direction,
                            version,
                            kind: WarningKind::Extraction(reason),
                            raw: Some(channel.to_string()),
                        };
                        warn!(channel_data = %channel, "{}", warning);
                        batch.warnings.push(warning);
                    }
                }
            }
        }

        debug!(
            "Mapped {} points ({} channels skipped)",
            batch.points.len(),
            batch.warnings.len()
        );
        batch
    }

    fn map_channel(
        &self,
        channel: &Value,
        direction: Direction,
        version: DocsisVersion,
        captured_at: DateTime<Utc>,
    ) -> Result<Option<MetricPoint>, String> {
        let channel = channel
            .as_object()
            .ok_or_else(|| format!("channel entry is {}, expected an object", kind_of(channel)))?;

        let mut tags = Tags::new();
        if let Some(id) = label(channel.get("channelID"), "channelID")? {
            tags.insert("channel_id".into(), id);
        }
        tags.insert("direction".into(), direction.as_str().into());
        tags.insert("docsis_version".into(), version.as_str().into());
        if let Some(frequency) = label(truthy(channel, "frequency"), "frequency")? {
            tags.insert("frequency_str".into(), frequency);
        }
        let modulation = match label(truthy(channel, "modulation"), "modulation")? {
            Some(m) => Some(m),
            None => label(truthy(channel, "type"), "type")?,
        };
        if let Some(modulation) = modulation {
            tags.insert("modulation".into(), modulation);
        }

        let mut fields = Fields::new();
        let float = |fields: &mut Fields, key: &str, name: &str| {
            if let Some(v) = channel.get(key).and_then(numeric_with_locale) {
                fields.insert(name.into(), FieldValue::Float(v));
            }
        };
        float(&mut fields, "powerLevel", "power_level");
        if direction == Direction::Downstream {
            float(&mut fields, "mse", "mse");
            match version {
                DocsisVersion::V30 => float(&mut fields, "latency", "latency"),
                DocsisVersion::V31 => float(&mut fields, "mer", "mer"),
            }
        }

        let integer = |fields: &mut Fields, key: &str, name: &str| {
            if let Some(v) = channel.get(key).and_then(integer_via_float) {
                fields.insert(name.into(), FieldValue::Integer(v));
            }
        };
        integer(&mut fields, "corrErrors", "corr_errors");
        integer(&mut fields, "nonCorrErrors", "non_corr_errors");
        match (direction, version) {
            (Direction::Downstream, DocsisVersion::V31) => integer(&mut fields, "plc", "plc"),
            (Direction::Upstream, DocsisVersion::V31) => integer(&mut fields, "activesub", "activesub"),
            _ => {}
        }

        if version == DocsisVersion::V31 {
            if let Some(fft) = passthrough(truthy(channel, "fft"), "fft")? {
                fields.insert("fft".into(), fft);
            }
        }
        if (direction, version) == (Direction::Upstream, DocsisVersion::V30) {
            if let Some(multiplex) = passthrough(truthy(channel, "multiplex"), "multiplex")? {
                fields.insert("multiplex".into(), multiplex);
            }
        }

        Ok(MetricPoint::new(&self.measurement, captured_at, tags, fields))
    }
}

/// Best-effort channel id for diagnostics, never fails
fn channel_label(channel: &Value) -> Option<String> {
    match channel.get("channelID")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Value under `key` unless it is null, `false`, zero or empty.
fn truthy<'a>(channel: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    channel.get(key).filter(|value| !is_blank(value))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Read a tag value: strings as-is, numbers and booleans stringified,
/// null or empty string treated as absent.
fn label(value: Option<&Value>, key: &str) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(format!("'{}' is {}, expected a scalar", key, kind_of(other))),
    }
}

/// Carry a categorical value through unchanged, dropping null and empty.
fn passthrough(value: Option<&Value>, key: &str) -> Result<Option<FieldValue>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(FieldValue::String(s.clone()))),
        Some(Value::Bool(b)) => Ok(Some(FieldValue::Boolean(*b))),
        Some(Value::Number(n)) => Ok(n
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| n.as_f64().map(FieldValue::Float))),
        Some(other) => Err(format!("'{}' is {}, expected a scalar", key, kind_of(other))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn payload(value: Value) -> DocInfo {
        serde_json::from_value(value).unwrap()
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_payload_yields_no_points() {
        let mapper = ChannelMetricsMapper::default();
        let batch = mapper.map_detailed(&DocInfo::default(), ts());
        assert!(batch.points.is_empty());
        assert!(batch.warnings.is_empty());
    }

    #[test]
    fn test_downstream_30_locale_channel() {
        let info = payload(json!({"data": {"channelDs": {"docsis30": [{
            "channelID": 7,
            "frequency": "602",
            "modulation": "256QAM",
            "powerLevel": "5,4",
            "corrErrors": "12",
            "nonCorrErrors": "0",
            "latency": "0.5"
        }]}}}));

        let points = ChannelMetricsMapper::default().map(&info, ts());
        assert_eq!(points.len(), 1);
        let p = &points[0];
        assert_eq!(p.measurement(), DEFAULT_MEASUREMENT);
        assert_eq!(p.timestamp(), ts());
        assert_eq!(p.tag("channel_id"), Some("7"));
        assert_eq!(p.tag("direction"), Some("downstream"));
        assert_eq!(p.tag("docsis_version"), Some("3.0"));
        assert_eq!(p.tag("frequency_str"), Some("602"));
        assert_eq!(p.tag("modulation"), Some("256QAM"));

        assert_eq!(p.fields().len(), 4);
        assert_eq!(p.field("power_level"), Some(&FieldValue::Float(5.4)));
        assert_eq!(p.field("corr_errors"), Some(&FieldValue::Integer(12)));
        assert_eq!(p.field("non_corr_errors"), Some(&FieldValue::Integer(0)));
        assert_eq!(p.field("latency"), Some(&FieldValue::Float(0.5)));
    }

    #[test]
    fn test_downstream_31_fields() {
        let info = payload(json!({"data": {"channelDs": {"docsis31": [{
            "channelID": 33,
            "type": "4096QAM",
            "powerLevel": 9.1,
            "mse": "-40.2",
            "mer": "41",
            "plc": "759.0",
            "fft": "4K",
            "latency": "0.3",
            "activesub": "1880"
        }]}}}));

        let points = ChannelMetricsMapper::default().map(&info, ts());
        let p = &points[0];
        assert_eq!(p.tag("modulation"), Some("4096QAM"));
        assert_eq!(p.field("mse"), Some(&FieldValue::Float(-40.2)));
        assert_eq!(p.field("mer"), Some(&FieldValue::Float(41.0)));
        assert_eq!(p.field("plc"), Some(&FieldValue::Integer(759)));
        assert_eq!(p.field("fft"), Some(&FieldValue::String("4K".into())));
        // not read for downstream 3.1
        assert!(p.field("latency").is_none());
        assert!(p.field("activesub").is_none());
    }

    #[test]
    fn test_upstream_fields() {
        let info = payload(json!({"data": {"channelUs": {
            "docsis30": [{"channelID": 1, "powerLevel": "44,5", "multiplex": "ATDMA", "mse": "-35"}],
            "docsis31": [{"channelID": 9, "powerLevel": "40", "activesub": "128.0", "fft": "2K", "multiplex": "x"}]
        }}}));

        let points = ChannelMetricsMapper::default().map(&info, ts());
        assert_eq!(points.len(), 2);

        let us30 = &points[0];
        assert_eq!(us30.tag("direction"), Some("upstream"));
        assert_eq!(us30.field("power_level"), Some(&FieldValue::Float(44.5)));
        assert_eq!(us30.field("multiplex"), Some(&FieldValue::String("ATDMA".into())));
        assert!(us30.field("mse").is_none());

        let us31 = &points[1];
        assert_eq!(us31.tag("docsis_version"), Some("3.1"));
        assert_eq!(us31.field("activesub"), Some(&FieldValue::Integer(128)));
        assert_eq!(us31.field("fft"), Some(&FieldValue::String("2K".into())));
        assert!(us31.field("multiplex").is_none());
    }

    #[test]
    fn test_modulation_falls_back_to_type() {
        let info = payload(json!({"data": {"channelDs": {"docsis30": [
            {"channelID": 1, "modulation": "", "type": "64QAM", "powerLevel": 1},
            {"channelID": 2, "modulation": "256QAM", "type": "64QAM", "powerLevel": 1}
        ]}}}));
        let points = ChannelMetricsMapper::default().map(&info, ts());
        assert_eq!(points[0].tag("modulation"), Some("64QAM"));
        assert_eq!(points[1].tag("modulation"), Some("256QAM"));
    }

    #[test]
    fn test_null_channel_dropped_siblings_kept() {
        let info = payload(json!({"data": {"channelDs": {"docsis30": [
            {"channelID": 1, "powerLevel": "3.0"},
            {"channelID": 2, "powerLevel": null, "corrErrors": null, "nonCorrErrors": null,
             "mse": null, "latency": null, "frequency": "114"},
            {"channelID": 3, "corrErrors": 5}
        ]}}}));

        let batch = ChannelMetricsMapper::default().map_detailed(&info, ts());
        let ids: Vec<_> = batch.points.iter().map(|p| p.tag("channel_id").unwrap()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        assert_eq!(batch.warnings.len(), 1);
        let warning = &batch.warnings[0];
        assert_eq!(warning.kind, WarningKind::NoFields);
        assert_eq!(warning.channel_id.as_deref(), Some("2"));
        assert_eq!(warning.direction, Direction::Downstream);
        assert_eq!(warning.version, DocsisVersion::V30);
    }

    #[test]
    fn test_malformed_channel_skipped_with_raw_content() {
        let info = payload(json!({"data": {"channelUs": {"docsis30": [
            "garbage",
            {"channelID": 4, "frequency": {"mhz": 37}, "powerLevel": 40},
            {"channelID": 5, "powerLevel": 41}
        ]}}}));

        let batch = ChannelMetricsMapper::default().map_detailed(&info, ts());
        assert_eq!(batch.points.len(), 1);
        assert_eq!(batch.points[0].tag("channel_id"), Some("5"));

        assert_eq!(batch.warnings.len(), 2);
        assert!(matches!(batch.warnings[0].kind, WarningKind::Extraction(_)));
        assert_eq!(batch.warnings[0].raw.as_deref(), Some("\"garbage\""));
        assert_eq!(batch.warnings[1].channel_id.as_deref(), Some("4"));
        assert!(batch.warnings[1].raw.as_deref().unwrap().contains("mhz"));
    }

    #[test]
    fn test_order_follows_list_order() {
        let info = payload(json!({"data": {
            "channelUs": {"docsis31": [{"channelID": "u31", "powerLevel": 1}],
                          "docsis30": [{"channelID": "u30", "powerLevel": 1}]},
            "channelDs": {"docsis31": [{"channelID": "d31a", "powerLevel": 1},
                                       {"channelID": "d31b", "powerLevel": 1}],
                          "docsis30": [{"channelID": "d30", "powerLevel": 1}]}
        }}));

        let points = ChannelMetricsMapper::default().map(&info, ts());
        let ids: Vec<_> = points.iter().map(|p| p.tag("channel_id").unwrap()).collect();
        assert_eq!(ids, vec!["d30", "d31a", "d31b", "u30", "u31"]);
    }

    #[test]
    fn test_mapping_is_repeatable() {
        let info = payload(json!({"data": {"channelDs": {"docsis30": [
            {"channelID": 1, "powerLevel": "2,5", "corrErrors": "3"},
            {"channelID": 2}
        ]}}}));
        let mapper = ChannelMetricsMapper::new("custom");
        assert_eq!(mapper.map_detailed(&info, ts()), mapper.map_detailed(&info, ts()));
        assert_eq!(mapper.map(&info, ts())[0].measurement(), "custom");
    }

    #[test]
    fn test_missing_channel_id_omits_tag() {
        let info = payload(json!({"data": {"channelDs": {"docsis30": [{"powerLevel": 1}]}}}));
        let points = ChannelMetricsMapper::default().map(&info, ts());
        assert!(points[0].tag("channel_id").is_none());
        assert!(points[0].tag("frequency_str").is_none());
    }

    #[test]
    fn test_zero_and_false_count_as_empty() {
        let info = payload(json!({"data": {"channelUs": {"docsis30": [
            {"channelID": 1, "multiplex": 0, "modulation": 0, "type": "64QAM"},
            {"channelID": 2, "multiplex": false},
            {"channelID": 3, "multiplex": "ATDMA", "modulation": false, "type": "16QAM", "frequency": 0}
        ]}}}));

        let batch = ChannelMetricsMapper::default().map_detailed(&info, ts());
        assert_eq!(batch.points.len(), 1);
        let point = &batch.points[0];
        assert_eq!(point.tag("channel_id"), Some("3"));
        assert_eq!(point.tag("modulation"), Some("16QAM"));
        assert!(point.tag("frequency_str").is_none());

        assert_eq!(batch.warnings.len(), 2);
        assert!(batch.warnings.iter().all(|w| w.kind == WarningKind::NoFields));
        assert_eq!(batch.warnings[0].channel_id.as_deref(), Some("1"));
        assert_eq!(batch.warnings[1].channel_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_modulation_zero_falls_back_to_type() {
        let info = payload(json!({"data": {"channelUs": {"docsis31": [
            {"channelID": 9, "modulation": 0, "type": "OFDMA", "fft": 0, "powerLevel": "39.0"}
        ]}}}));

        let points = ChannelMetricsMapper::default().map(&info, ts());
        assert_eq!(points[0].tag("modulation"), Some("OFDMA"));
        assert!(points[0].field("fft").is_none());
    }
}
