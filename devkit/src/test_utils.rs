/*!
Test harness for poll cycles

Wires an `Agent` to a `MockRouter` and a `RecordingSink`, keeping handles
to both so a test can run cycles and then inspect what was requested and
what was written.
*/

use crate::fixtures::sample_doc_info;
use crate::router_stub::{Endpoint, MockRouter, RouterAccount};
use crate::sink_stub::RecordingSink;
use chrono::{DateTime, TimeZone, Utc};
use docsis_agent::{Agent, AgentResult, ChannelMetricsMapper, Credential, CycleReport, MetricPoint};

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "äbc";

/// Fixed capture time used by [`TestHarness::run_cycle`]
pub fn fixed_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub struct TestHarness {
    pub router: MockRouter,
    pub sink: RecordingSink,
    agent: Agent<MockRouter, RecordingSink>,
}

impl TestHarness {
    /// Harness serving the sample channel listing to the default account
    pub fn new() -> Self {
        Self::with_doc_info(sample_doc_info().to_json())
    }

    pub fn with_doc_info(doc_info_json: impl Into<String>) -> Self {
        let account = RouterAccount::new(TEST_USERNAME, TEST_PASSWORD);
        Self::build(MockRouter::with_account(account, doc_info_json), RecordingSink::new())
    }

    /// Harness around caller-provided doubles
    pub fn build(router: MockRouter, sink: RecordingSink) -> Self {
        env_logger::try_init().ok();

        let credential = Credential::new(TEST_USERNAME, TEST_PASSWORD)
            .unwrap_or_else(|e| panic!("test credential rejected: {e}"));
        let agent = Agent::new(
            router.clone(),
            sink.clone(),
            credential,
            ChannelMetricsMapper::default(),
        );
        Self { router, sink, agent }
    }

    pub fn agent(&self) -> &Agent<MockRouter, RecordingSink> {
        &self.agent
    }

    /// One cycle stamped with [`fixed_timestamp`]
    pub async fn run_cycle(&self) -> AgentResult<CycleReport> {
        self.agent.run_once(fixed_timestamp()).await
    }

    pub fn written_points(&self) -> Vec<MetricPoint> {
        self.sink.points()
    }

    /// Written point for one channel, looked up by its tags
    pub fn point_for(&self, direction: &str, version: &str, channel_id: &str) -> Option<MetricPoint> {
        self.sink.points().into_iter().find(|p| {
            p.tag("direction") == Some(direction)
                && p.tag("docsis_version") == Some(version)
                && p.tag("channel_id") == Some(channel_id)
        })
    }

    pub fn login_requests(&self) -> usize {
        self.router.requests_to(Endpoint::Login).len()
    }

    pub fn data_requests(&self) -> usize {
        self.router.requests_to(Endpoint::DocInfo).len()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_runs_sample_cycle() {
        let harness = TestHarness::new();
        let report = harness.run_cycle().await.unwrap();

        assert_eq!(report.channels_seen, 8);
        assert_eq!(report.points_written, 8);
        assert_eq!(harness.login_requests(), 2);
        assert_eq!(harness.data_requests(), 1);
        assert!(harness.point_for("upstream", "3.1", "9").is_some());
    }
}
