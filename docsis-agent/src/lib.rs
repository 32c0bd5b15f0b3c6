//! DOCSIS Agent - cable-modem channel metrics from FRITZ!Box routers
//!
//! One poll cycle:
//! - challenge-response login against `login_sid.lua` ([`auth`])
//! - fetch of the `docInfo` channel overview ([`router`], [`docinfo`])
//! - normalization into tagged metric points ([`mapping`])
//! - batch write to InfluxDB v2 ([`sink`])

pub mod agent;
pub mod auth;
pub mod coerce;
pub mod config;
pub mod docinfo;
pub mod error;
pub mod mapping;
pub mod metrics;
pub mod router;
pub mod sink;

pub use agent::{Agent, CycleReport};
pub use auth::{challenge_response, Credential, SessionAuthenticator, SessionToken, SENTINEL_SID};
pub use config::AgentConfig;
pub use docinfo::DocInfo;
pub use error::{AgentError, AgentResult};
pub use mapping::{ChannelMetricsMapper, ExtractionWarning, MappedBatch};
pub use metrics::{Direction, DocsisVersion, FieldValue, MetricPoint};
pub use router::{HttpRouterClient, RouterTransport};
pub use sink::{InfluxSink, MetricsSink};
