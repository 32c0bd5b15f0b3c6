//! FRITZ!Box challenge-response login
//!
//! Flow against `login_sid.lua`:
//! 1. unauthenticated GET, read `SID` and `Challenge` from the XML answer
//! 2. a non-zero `SID` is an already open session and is returned as-is
//! 3. otherwise answer the challenge with
//!    `challenge + "-" + md5(utf16le(challenge + "-" + password))`
//! 4. GET again with `username` + `response`; a zero `SID` means rejected,
//!    optionally with a `BlockTime` lockout in seconds
//!
//! Nothing is retried: every failure ends the login attempt.

use crate::error::{AgentError, AgentResult};
use crate::router::RouterTransport;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info, warn};

/// The "no session" SID returned by the router
pub const SENTINEL_SID: &str = "0000000000000000";

/// Opaque session id valid for one data fetch
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a SID, rejecting empty and all-zero values.
    pub fn parse(sid: &str) -> Option<Self> {
        let sid = sid.trim();
        if sid.is_empty() || sid.chars().all(|c| c == '0') {
            None
        } else {
            Some(Self(sid.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First characters only, for logs
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&self.masked()).finish()
    }
}

/// Router login credentials
#[derive(Clone)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> AgentResult<Self> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() || password.is_empty() {
            return Err(AgentError::config("router username or password not set"));
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Fields of a `<SessionInfo>` document the login needs
#[derive(Debug, Default, Deserialize)]
struct SessionInfo {
    #[serde(rename = "SID")]
    sid: Option<String>,
    #[serde(rename = "Challenge")]
    challenge: Option<String>,
    #[serde(rename = "BlockTime")]
    block_time: Option<String>,
}

/// Server answer to a login request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    pub sid: Option<String>,
    pub challenge: Option<String>,
    /// Seconds until the router accepts another attempt, when positive
    pub block_time: Option<u64>,
}

impl LoginState {
    pub fn from_xml(body: &str) -> AgentResult<Self> {
        let info: SessionInfo = quick_xml::de::from_str(body).map_err(|e| {
            AgentError::data_format(format!("could not parse login XML response: {e}"))
        })?;

        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(Self {
            sid: non_empty(info.sid),
            challenge: non_empty(info.challenge),
            block_time: non_empty(info.block_time)
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0),
        })
    }

    pub fn session(&self) -> Option<SessionToken> {
        self.sid.as_deref().and_then(SessionToken::parse)
    }
}

/// Compute the login response for a challenge.
pub fn challenge_response(challenge: &str, password: &str) -> String {
    let utf16le: Vec<u8> = format!("{challenge}-{password}")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    format!("{}-{:x}", challenge, md5::compute(utf16le))
}

/// Performs the two-step login and yields a [`SessionToken`].
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    credential: Credential,
}

impl SessionAuthenticator {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    pub async fn authenticate<T>(&self, transport: &T) -> AgentResult<SessionToken>
    where
        T: RouterTransport + ?Sized,
    {
        let body = transport.login(&[]).await?;
        let initial = LoginState::from_xml(&body)?;

        if let Some(token) = initial.session() {
            info!("Router granted a session without challenge");
            return Ok(token);
        }

        let challenge = initial
            .challenge
            .ok_or_else(|| AgentError::protocol("no Challenge in login response"))?;
        debug!("Received login challenge {}", challenge);

        let response = challenge_response(&challenge, &self.credential.password);
        let body = transport
            .login(&[
                ("username", self.credential.username.as_str()),
                ("response", response.as_str()),
            ])
            .await?;
        let answer = LoginState::from_xml(&body)?;

        if answer.sid.is_none() {
            return Err(AgentError::protocol("no SID in login response"));
        }
        match answer.session() {
            Some(token) => {
                info!("Logged in to router as {}", self.credential.username);
                debug!("Session {:?}", token);
                Ok(token)
            }
            None => {
                warn!(
                    "Router rejected login for {} (block time: {:?})",
                    self.credential.username, answer.block_time
                );
                Err(AgentError::Auth {
                    block_time: answer.block_time,
                })
            }
        }
    }
}
