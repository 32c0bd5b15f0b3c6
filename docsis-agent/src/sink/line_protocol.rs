//! InfluxDB v2 Line Protocol encoding.
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_s
//! ```
//!
//! Timestamps are written in whole seconds; writes must use
//! `precision=s`.

use crate::metrics::{FieldValue, MetricPoint};

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`)
    /// - Integer: suffixed with `i` (e.g., `42i`)
    /// - String: double-quoted, `\` and `"` escaped
    /// - Boolean: `true` or `false`
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
            FieldValue::Boolean(v) => v.to_string(),
        }
    }
}

/// Encode one point. Tags and fields come out sorted by key.
pub fn encode_point(point: &MetricPoint) -> String {
    let mut line = escape_measurement(point.measurement());

    for (key, value) in point.tags() {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    line.push(' ');
    let fields: Vec<String> = point
        .fields()
        .iter()
        .map(|(key, value)| format!("{}={}", escape_key(key), value.to_line_protocol()))
        .collect();
    line.push_str(&fields.join(","));

    line.push(' ');
    line.push_str(&point.timestamp().timestamp().to_string());
    line
}

/// Encode a batch as a newline-separated request body.
pub fn encode_batch(points: &[MetricPoint]) -> String {
    points.iter().map(encode_point).collect::<Vec<_>>().join("\n")
}

/// Spaces and commas must be escaped in measurement names.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys share the same escaping rules.
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Fields, Tags};
    use chrono::{TimeZone, Utc};

    fn point(tags: &[(&str, &str)], fields: &[(&str, FieldValue)]) -> MetricPoint {
        let tags: Tags = tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let fields: Fields = fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        MetricPoint::new(
            "docsis_channel_metrics",
            Utc.timestamp_opt(1_714_564_800, 0).unwrap(),
            tags,
            fields,
        )
        .unwrap()
    }

    #[test]
    fn test_field_value_formats() {
        assert_eq!(FieldValue::Float(5.4).to_line_protocol(), "5.4");
        assert_eq!(FieldValue::Float(41.0).to_line_protocol(), "41");
        assert_eq!(FieldValue::Integer(12).to_line_protocol(), "12i");
        assert_eq!(FieldValue::Boolean(false).to_line_protocol(), "false");
        assert_eq!(
            FieldValue::String("say \"hi\"".into()).to_line_protocol(),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_encode_point_sorted() {
        let p = point(
            &[("direction", "downstream"), ("channel_id", "7"), ("docsis_version", "3.0")],
            &[
                ("power_level", FieldValue::Float(5.4)),
                ("corr_errors", FieldValue::Integer(12)),
            ],
        );
        assert_eq!(
            encode_point(&p),
            "docsis_channel_metrics,channel_id=7,direction=downstream,docsis_version=3.0 \
             corr_errors=12i,power_level=5.4 1714564800"
        );
    }

    #[test]
    fn test_encode_escapes_tag_values() {
        let p = point(
            &[("frequency_str", "114 MHz"), ("modulation", "a=b,c")],
            &[("fft", FieldValue::String("4K".into()))],
        );
        assert_eq!(
            encode_point(&p),
            "docsis_channel_metrics,frequency_str=114\\ MHz,modulation=a\\=b\\,c fft=\"4K\" 1714564800"
        );
    }

    #[test]
    fn test_encode_batch_joins_lines() {
        let a = point(&[], &[("mse", FieldValue::Float(-38.5))]);
        let b = point(&[], &[("plc", FieldValue::Integer(759))]);
        let body = encode_batch(&[a, b]);
        assert_eq!(body.lines().count(), 2);
        assert!(body.ends_with("plc=759i 1714564800"));
        assert!(encode_batch(&[]).is_empty());
    }
}
