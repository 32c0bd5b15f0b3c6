/*!
Recording metrics sink

Keeps every written batch in memory so tests can assert on the points a
poll cycle produced. Can be told to fail the ping or reject writes.
*/

use async_trait::async_trait;
use docsis_agent::{AgentError, AgentResult, MetricPoint, MetricsSink};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct SinkState {
    batches: Vec<Vec<MetricPoint>>,
    pings: usize,
    unreachable: bool,
    reject_writes: bool,
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose ping fails
    pub fn unreachable() -> Self {
        let sink = Self::new();
        sink.state.lock().unreachable = true;
        sink
    }

    /// Sink that answers pings but rejects every write
    pub fn rejecting() -> Self {
        let sink = Self::new();
        sink.state.lock().reject_writes = true;
        sink
    }

    pub fn batches(&self) -> Vec<Vec<MetricPoint>> {
        self.state.lock().batches.clone()
    }

    /// All points from all batches, in write order
    pub fn points(&self) -> Vec<MetricPoint> {
        self.state.lock().batches.iter().flatten().cloned().collect()
    }

    pub fn ping_count(&self) -> usize {
        self.state.lock().pings
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().batches.len()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn ping(&self) -> AgentResult<()> {
        let mut state = self.state.lock();
        state.pings += 1;
        if state.unreachable {
            return Err(AgentError::sink("InfluxDB ping failed (mock)"));
        }
        Ok(())
    }

    async fn write(&self, points: &[MetricPoint]) -> AgentResult<()> {
        let mut state = self.state.lock();
        if state.reject_writes {
            return Err(AgentError::sink("write rejected (mock)"));
        }
        log::info!("[MOCK] Recorded batch of {} points", points.len());
        state.batches.push(points.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_modes() {
        assert!(RecordingSink::unreachable().ping().await.is_err());

        let sink = RecordingSink::rejecting();
        assert!(sink.ping().await.is_ok());
        assert!(sink.write(&[]).await.is_err());
        assert_eq!(sink.write_count(), 0);
        assert_eq!(sink.ping_count(), 1);
    }
}
