//! Typed view of the router's `docInfo` page
//!
//! ```text
//! {"data": {"channelDs": {"docsis30": [...], "docsis31": [...]},
//!           "channelUs": {"docsis30": [...], "docsis31": [...]}}}
//! ```
//!
//! Channel entries stay untyped: their keys and value types vary by firmware
//! and are interpreted by the mapper. Missing or null groups and lists read
//! as empty.

use crate::error::{AgentError, AgentResult};
use crate::metrics::{Direction, DocsisVersion};
use serde::Deserialize;
use serde_json::Value;

/// Iteration order of the four channel lists
pub const CHANNEL_LISTS: [(Direction, DocsisVersion); 4] = [
    (Direction::Downstream, DocsisVersion::V30),
    (Direction::Downstream, DocsisVersion::V31),
    (Direction::Upstream, DocsisVersion::V30),
    (Direction::Upstream, DocsisVersion::V31),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: DocInfoData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocInfoData {
    #[serde(rename = "channelDs", default, deserialize_with = "null_as_default")]
    pub channel_ds: ChannelGroup,
    #[serde(rename = "channelUs", default, deserialize_with = "null_as_default")]
    pub channel_us: ChannelGroup,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelGroup {
    #[serde(default, deserialize_with = "null_as_default")]
    pub docsis30: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub docsis31: Vec<Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl DocInfo {
    /// Parse a raw `data.lua` response body.
    pub fn from_json(body: &str) -> AgentResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| AgentError::data_format(format!("docInfo response is not valid JSON: {e}")))
    }

    /// Channel entries of one list, empty when the router omitted it.
    pub fn channels(&self, direction: Direction, version: DocsisVersion) -> &[Value] {
        let group = match direction {
            Direction::Downstream => &self.data.channel_ds,
            Direction::Upstream => &self.data.channel_us,
        };
        match version {
            DocsisVersion::V30 => &group.docsis30,
            DocsisVersion::V31 => &group.docsis31,
        }
    }

    pub fn channel_count(&self) -> usize {
        CHANNEL_LISTS
            .iter()
            .map(|(direction, version)| self.channels(*direction, *version).len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_are_empty() {
        let info = DocInfo::from_json(r#"{"data": {"channelDs": {"docsis30": [{"channelID": 1}]}}}"#).unwrap();
        assert_eq!(info.channels(Direction::Downstream, DocsisVersion::V30).len(), 1);
        assert!(info.channels(Direction::Downstream, DocsisVersion::V31).is_empty());
        assert!(info.channels(Direction::Upstream, DocsisVersion::V30).is_empty());
        assert_eq!(info.channel_count(), 1);
    }

    #[test]
    fn test_null_and_empty_payloads() {
        assert_eq!(DocInfo::from_json("{}").unwrap().channel_count(), 0);
        assert_eq!(DocInfo::from_json(r#"{"data": null}"#).unwrap().channel_count(), 0);
        let info = DocInfo::from_json(r#"{"data": {"channelUs": {"docsis31": null}}}"#).unwrap();
        assert_eq!(info.channel_count(), 0);
    }

    #[test]
    fn test_unrelated_keys_ignored() {
        let info = DocInfo::from_json(r#"{"pid": "docInfo", "data": {"readyState": "ready"}}"#).unwrap();
        assert_eq!(info.channel_count(), 0);
    }

    #[test]
    fn test_invalid_json_is_data_format_error() {
        let err = DocInfo::from_json("<html>login</html>").unwrap_err();
        assert!(matches!(err, AgentError::DataFormat { .. }));
    }
}
