//! Poll cycle: login → fetch → map → write
//!
//! Every cycle logs in afresh and uses its session for exactly one fetch.
//! Nothing is carried over between cycles.

use crate::auth::{Credential, SessionAuthenticator};
use crate::config::AgentConfig;
use crate::error::AgentResult;
use crate::mapping::{ChannelMetricsMapper, ExtractionWarning};
use crate::router::{fetch_doc_info, HttpRouterClient, RouterTransport};
use crate::sink::{InfluxSink, MetricsSink};
use chrono::{DateTime, Timelike, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Outcome of one successful cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub channels_seen: usize,
    pub points_written: usize,
    pub warnings: Vec<ExtractionWarning>,
}

impl CycleReport {
    /// True when the router returned nothing worth writing
    pub fn is_empty(&self) -> bool {
        self.points_written == 0
    }
}

pub struct Agent<R, S> {
    router: R,
    sink: S,
    authenticator: SessionAuthenticator,
    mapper: ChannelMetricsMapper,
}

impl Agent<HttpRouterClient, InfluxSink> {
    /// Build the production agent from a validated configuration.
    pub fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        config.validate()?;
        let credential = Credential::new(&config.router.username, &config.router.password)?;
        Ok(Self::new(
            HttpRouterClient::new(&config.router)?,
            InfluxSink::new(&config.influx)?,
            credential,
            ChannelMetricsMapper::new(&config.influx.measurement),
        ))
    }
}

impl<R, S> Agent<R, S>
where
    R: RouterTransport,
    S: MetricsSink,
{
    pub fn new(router: R, sink: S, credential: Credential, mapper: ChannelMetricsMapper) -> Self {
        Self {
            router,
            sink,
            authenticator: SessionAuthenticator::new(credential),
            mapper,
        }
    }

    /// Run one cycle stamped with the current time (whole seconds).
    pub async fn poll_once(&self) -> AgentResult<CycleReport> {
        let now = Utc::now();
        self.run_once(now.with_nanosecond(0).unwrap_or(now)).await
    }

    /// Run one cycle; every point in the batch carries `captured_at`.
    pub async fn run_once(&self, captured_at: DateTime<Utc>) -> AgentResult<CycleReport> {
        let token = self.authenticator.authenticate(&self.router).await?;
        let doc_info = fetch_doc_info(&self.router, &token).await?;

        let batch = self.mapper.map_detailed(&doc_info, captured_at);
        let report = CycleReport {
            channels_seen: doc_info.channel_count(),
            points_written: batch.points.len(),
            warnings: batch.warnings,
        };

        if batch.points.is_empty() {
            info!("No valid channel data points found, nothing to write");
            return Ok(report);
        }

        self.sink.ping().await?;
        self.sink.write(&batch.points).await?;

        if !report.warnings.is_empty() {
            warn!("{} channels skipped this cycle", report.warnings.len());
        }
        info!(
            "Cycle complete: {} points from {} channels",
            report.points_written, report.channels_seen
        );
        Ok(report)
    }

    /// Repeat [`Self::poll_once`] every `every` until Ctrl-C.
    ///
    /// A failed cycle is logged and the next tick runs normally.
    pub async fn run_forever(&self, every: Duration) {
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Could not listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(every, interrupted).await;
    }

    /// Poll every `every` until `shutdown` completes, also mid-cycle.
    pub async fn run_until<F>(&self, every: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Polling every {}s", every.as_secs());
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        result = self.poll_once() => {
                            if let Err(e) = result {
                                error!("Poll cycle failed: {}", e);
                            }
                        }

                        _ = &mut shutdown => {
                            info!("Interrupted during a cycle, stopping poll loop");
                            break;
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("Interrupted, stopping poll loop");
                    break;
                }
            }
        }
    }
}
