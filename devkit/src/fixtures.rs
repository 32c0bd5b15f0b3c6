/*!
Payload fixtures for router tests

Builds the two documents the router serves:
- `<SessionInfo>` login answers
- `docInfo` channel listings, list by list
*/

use serde_json::{json, Value};

/// Challenge handed out by the test doubles (AVM documentation example)
pub const TEST_CHALLENGE: &str = "1234567z";

/// Session id granted on successful login
pub const TEST_SID: &str = "8b4994376ab804ca";

/// Sentinel "no session" id
pub const NO_SESSION: &str = docsis_agent::SENTINEL_SID;

/// Builds a `login_sid.lua` answer
pub fn login_xml(sid: &str, challenge: Option<&str>, block_time: u64) -> String {
    let challenge = challenge
        .map(|c| format!("<Challenge>{c}</Challenge>"))
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <SessionInfo><SID>{sid}</SID>{challenge}<BlockTime>{block_time}</BlockTime>\
         <Rights></Rights><Users><User last=\"1\">admin</User></Users></SessionInfo>"
    )
}

/// Builds `data.lua?page=docInfo` payloads
#[derive(Debug, Clone, Default)]
pub struct DocInfoBuilder {
    ds30: Option<Vec<Value>>,
    ds31: Option<Vec<Value>>,
    us30: Option<Vec<Value>>,
    us31: Option<Vec<Value>>,
}

impl DocInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downstream30(mut self, channel: Value) -> Self {
        self.ds30.get_or_insert_with(Vec::new).push(channel);
        self
    }

    pub fn downstream31(mut self, channel: Value) -> Self {
        self.ds31.get_or_insert_with(Vec::new).push(channel);
        self
    }

    pub fn upstream30(mut self, channel: Value) -> Self {
        self.us30.get_or_insert_with(Vec::new).push(channel);
        self
    }

    pub fn upstream31(mut self, channel: Value) -> Self {
        self.us31.get_or_insert_with(Vec::new).push(channel);
        self
    }

    /// Only lists that received a channel are emitted
    pub fn build(&self) -> Value {
        let group = |d30: &Option<Vec<Value>>, d31: &Option<Vec<Value>>| {
            let mut group = serde_json::Map::new();
            if let Some(list) = d30 {
                group.insert("docsis30".into(), Value::Array(list.clone()));
            }
            if let Some(list) = d31 {
                group.insert("docsis31".into(), Value::Array(list.clone()));
            }
            Value::Object(group)
        };

        json!({
            "pid": "docInfo",
            "data": {
                "channelDs": group(&self.ds30, &self.ds31),
                "channelUs": group(&self.us30, &self.us31),
                "readyState": "ready"
            }
        })
    }

    pub fn to_json(&self) -> String {
        self.build().to_string()
    }
}

/// A realistic cable connection: four downstream 3.0, one downstream 3.1,
/// two upstream 3.0 and one upstream 3.1 channel
pub fn sample_doc_info() -> DocInfoBuilder {
    let mut builder = DocInfoBuilder::new();
    for (id, freq, power) in [(1, "114", "4,2"), (2, "122", "4,5"), (3, "130", "4,8"), (4, "138", "5,1")] {
        builder = builder.downstream30(json!({
            "channelID": id,
            "frequency": freq,
            "modulation": "256QAM",
            "powerLevel": power,
            "mse": "-38.9",
            "latency": 0.32,
            "corrErrors": 17,
            "nonCorrErrors": 0
        }));
    }
    builder
        .downstream31(json!({
            "channelID": 33,
            "frequency": "751 - 861",
            "type": "4096QAM",
            "powerLevel": "7.9",
            "mer": "42",
            "plc": "759",
            "fft": "4K",
            "corrErrors": "24897",
            "nonCorrErrors": "12"
        }))
        .upstream30(json!({
            "channelID": 1,
            "frequency": "51",
            "modulation": "64QAM",
            "powerLevel": "44.0",
            "multiplex": "ATDMA"
        }))
        .upstream30(json!({
            "channelID": 2,
            "frequency": "44.4",
            "modulation": "64QAM",
            "powerLevel": "43.5",
            "multiplex": "ATDMA"
        }))
        .upstream31(json!({
            "channelID": 9,
            "frequency": "29.8 - 64.8",
            "type": "OFDMA",
            "powerLevel": "39.25",
            "activesub": "1880.0",
            "fft": "2K"
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsis_agent::DocInfo;

    #[test]
    fn test_login_xml_parses() {
        let xml = login_xml(NO_SESSION, Some(TEST_CHALLENGE), 0);
        let state = docsis_agent::auth::LoginState::from_xml(&xml).unwrap();
        assert_eq!(state.challenge.as_deref(), Some(TEST_CHALLENGE));
        assert!(state.session().is_none());
    }

    #[test]
    fn test_builder_emits_only_filled_lists() {
        let value = DocInfoBuilder::new().upstream31(json!({"channelID": 1})).build();
        assert!(value["data"]["channelUs"]["docsis31"].is_array());
        assert!(value["data"]["channelUs"].get("docsis30").is_none());
        assert!(value["data"]["channelDs"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_sample_doc_info_counts() {
        let info = DocInfo::from_json(&sample_doc_info().to_json()).unwrap();
        assert_eq!(info.channel_count(), 8);
    }
}
