//! Metrics destination
//!
//! The agent needs two things from a time-series store: a connectivity check
//! and a batch write. [`InfluxSink`] implements both against InfluxDB v2.

pub mod influx;
pub mod line_protocol;

pub use influx::InfluxSink;

use crate::error::AgentResult;
use crate::metrics::MetricPoint;
use async_trait::async_trait;

#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Check that the destination is reachable.
    async fn ping(&self) -> AgentResult<()>;

    /// Write one batch of points.
    async fn write(&self, points: &[MetricPoint]) -> AgentResult<()>;
}

/// Show only the ends of a secret: `abcd...wxyz`.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "TOKEN_NOT_SHOWN".to_string()
    }
}
