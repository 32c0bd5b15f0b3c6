//! InfluxDB v2 HTTP writer
//!
//! - `GET  <url>/ping` for the connectivity check
//! - `POST <url>/api/v2/write?org=..&bucket=..&precision=s` with a
//!   line-protocol body and `Authorization: Token <token>`

use super::line_protocol::encode_batch;
use super::{mask_token, MetricsSink};
use crate::config::InfluxConfig;
use crate::error::{AgentError, AgentResult};
use crate::metrics::MetricPoint;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

pub struct InfluxSink {
    client: Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::config(format!("could not build InfluxDB HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }

    /// Destination summary with the token masked, for logs and errors
    pub fn describe(&self) -> String {
        format!(
            "URL: {}, Org: {}, Bucket: {}, Token: {}",
            self.url,
            self.org,
            self.bucket,
            mask_token(&self.token)
        )
    }

    fn failure(&self, what: impl std::fmt::Display) -> AgentError {
        AgentError::sink(format!("{what} ({})", self.describe()))
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    async fn ping(&self) -> AgentResult<()> {
        let url = format!("{}/ping", self.url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.failure(format!("InfluxDB ping failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.failure(format!("InfluxDB ping returned {}", response.status())));
        }
        debug!("InfluxDB ping ok");
        Ok(())
    }

    async fn write(&self, points: &[MetricPoint]) -> AgentResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        info!("Writing {} points to InfluxDB ({})", points.len(), self.describe());
        let url = format!("{}/api/v2/write", self.url);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(encode_batch(points))
            .send()
            .await
            .map_err(|e| self.failure(format!("InfluxDB write failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.failure(format!("InfluxDB rejected write with {status}: {body}")));
        }

        info!("Data successfully written to InfluxDB");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InfluxConfig {
        InfluxConfig {
            url: "http://127.0.0.1:9/".into(),
            token: "supersecrettoken".into(),
            org: "home".into(),
            timeout_secs: 2,
            ..InfluxConfig::default()
        }
    }

    #[test]
    fn test_describe_masks_token() {
        let sink = InfluxSink::new(&config()).unwrap();
        let text = sink.describe();
        assert!(text.contains("URL: http://127.0.0.1:9,"));
        assert!(text.contains("Token: supe...oken"));
        assert!(!text.contains("supersecrettoken"));
    }

    #[tokio::test]
    async fn test_unreachable_sink_is_sink_error() {
        let sink = InfluxSink::new(&config()).unwrap();
        let err = sink.ping().await.unwrap_err();
        assert!(matches!(err, AgentError::Sink { .. }));
        assert!(!err.to_string().contains("supersecrettoken"));
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let sink = InfluxSink::new(&config()).unwrap();
        assert!(sink.write(&[]).await.is_ok());
    }
}
