//! Error taxonomy for the DOCSIS agent
//!
//! Every failure that ends a poll cycle is an [`AgentError`]. Per-channel
//! problems found while mapping are not errors: they surface as
//! [`crate::mapping::ExtractionWarning`] values and the channel is skipped.

use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or blank required setting
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Connection failure or timeout
    #[error("Network error while {action}: {message}")]
    Network {
        action: String,
        message: String,
        timed_out: bool,
    },

    /// Endpoint answered with a non-success status
    #[error("HTTP error from {url}: {status}{}", hint_suffix(.hint))]
    HttpStatus {
        url: String,
        status: u16,
        hint: Option<String>,
    },

    /// Response parsed but did not have the expected shape
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Router rejected the credentials
    #[error("Login failed, check username/password{}", block_suffix(.block_time))]
    Auth { block_time: Option<u64> },

    /// Response body was not valid XML/JSON
    #[error("Data format error: {message}")]
    DataFormat { message: String },

    /// Metrics store unreachable or write rejected
    #[error("Sink error: {message}")]
    Sink { message: String },
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_deref().map(|h| format!(" ({h})")).unwrap_or_default()
}

fn block_suffix(block_time: &Option<u64>) -> String {
    block_time
        .map(|secs| format!(". Login blocked for {secs} seconds"))
        .unwrap_or_default()
}

impl AgentError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol { message: message.into() }
    }

    pub fn data_format(message: impl Into<String>) -> Self {
        Self::DataFormat { message: message.into() }
    }

    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink { message: message.into() }
    }

    /// Classify a reqwest failure raised while performing `action`.
    pub fn from_reqwest(action: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::HttpStatus {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
                hint: None,
            };
        }
        Self::Network {
            action: action.to_string(),
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }

    /// Process exit code for the CLI, one per error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } => 2,
            Self::Network { .. } | Self::HttpStatus { .. } => 3,
            Self::Protocol { .. } => 4,
            Self::Auth { .. } => 5,
            Self::DataFormat { .. } => 6,
            Self::Sink { .. } => 7,
        }
    }
}
