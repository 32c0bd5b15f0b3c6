/*!
In-memory router for tests without a FRITZ!Box

`MockRouter` implements `RouterTransport`, records every request and
answers either from scripted replies or from a `RouterAccount` that runs
the real challenge check.
*/

use crate::fixtures::{login_xml, NO_SESSION, TEST_CHALLENGE, TEST_SID};
use async_trait::async_trait;
use docsis_agent::{challenge_response, AgentError, AgentResult, RouterTransport, SessionToken};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Router-side login logic shared by the in-memory and HTTP fakes
#[derive(Debug, Clone)]
pub struct RouterAccount {
    pub username: String,
    pub password: String,
    pub challenge: String,
    pub sid: String,
    /// Lockout reported after a wrong response
    pub block_time_on_failure: u64,
    /// Grant a session on the first, unauthenticated request
    pub open_session: bool,
}

impl RouterAccount {
    pub fn new<S: Into<String>>(username: S, password: S) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            challenge: TEST_CHALLENGE.to_string(),
            sid: TEST_SID.to_string(),
            block_time_on_failure: 0,
            open_session: false,
        }
    }

    pub fn with_block_time(mut self, secs: u64) -> Self {
        self.block_time_on_failure = secs;
        self
    }

    pub fn with_open_session(mut self) -> Self {
        self.open_session = true;
        self
    }

    /// Answer a `login_sid.lua` request with the given query parameters
    pub fn answer(&self, params: &[(String, String)]) -> String {
        let param = |name: &str| params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());

        match param("response") {
            None if self.open_session => login_xml(&self.sid, Some(&self.challenge), 0),
            None => login_xml(NO_SESSION, Some(&self.challenge), 0),
            Some(response)
                if param("username") == Some(self.username.as_str())
                    && response == challenge_response(&self.challenge, &self.password) =>
            {
                log::info!("[MOCK] Login accepted for {}", self.username);
                login_xml(&self.sid, Some(&self.challenge), 0)
            }
            Some(_) => {
                log::info!("[MOCK] Login rejected");
                login_xml(NO_SESSION, Some(&self.challenge), self.block_time_on_failure)
            }
        }
    }

    pub fn accepts_session(&self, sid: &str) -> bool {
        sid == self.sid
    }
}

/// Scripted outcome of one router request
#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
    Timeout,
    /// Never answers
    Stall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    DocInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub endpoint: Endpoint,
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct MockRouterState {
    account: Option<RouterAccount>,
    login_replies: VecDeque<Reply>,
    doc_info: Option<Reply>,
    requests: Vec<RecordedRequest>,
}

/// Mock router that records requests and replays answers
#[derive(Clone, Default)]
pub struct MockRouter {
    state: Arc<Mutex<MockRouterState>>,
}

impl MockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with one account and a docInfo body served to its session
    pub fn with_account(account: RouterAccount, doc_info_json: impl Into<String>) -> Self {
        let router = Self::new();
        {
            let mut state = router.state.lock();
            state.account = Some(account);
            state.doc_info = Some(Reply::Body(doc_info_json.into()));
        }
        router
    }

    /// Queue a login reply; queued replies win over the account logic
    pub fn push_login_reply(&self, reply: Reply) -> &Self {
        self.state.lock().login_replies.push_back(reply);
        self
    }

    pub fn set_doc_info(&self, reply: Reply) -> &Self {
        self.state.lock().doc_info = Some(reply);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn requests_to(&self, endpoint: Endpoint) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.endpoint == endpoint).collect()
    }

    pub fn clear(&self) {
        self.state.lock().requests.clear();
    }

    fn resolve(reply: Reply, path: &str) -> AgentResult<String> {
        match reply {
            Reply::Body(body) => Ok(body),
            Reply::Status(status) => Err(AgentError::HttpStatus {
                url: format!("mock://router{path}"),
                status,
                hint: None,
            }),
            Reply::Timeout | Reply::Stall => Err(AgentError::Network {
                action: format!("connecting to mock://router{path}"),
                message: "operation timed out".to_string(),
                timed_out: true,
            }),
        }
    }

    async fn answer(reply: Reply, path: &str) -> AgentResult<String> {
        if let Reply::Stall = reply {
            std::future::pending::<()>().await;
        }
        Self::resolve(reply, path)
    }
}

#[async_trait]
impl RouterTransport for MockRouter {
    async fn login(&self, query: &[(&str, &str)]) -> AgentResult<String> {
        let params: Vec<(String, String)> =
            query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();

        let reply = {
            let mut state = self.state.lock();
            state.requests.push(RecordedRequest {
                endpoint: Endpoint::Login,
                params: params.clone(),
            });
            match state.login_replies.pop_front() {
                Some(reply) => reply,
                None => match &state.account {
                    Some(account) => Reply::Body(account.answer(&params)),
                    None => Reply::Status(404),
                },
            }
        };
        Self::answer(reply, "/login_sid.lua").await
    }

    async fn doc_info(&self, token: &SessionToken) -> AgentResult<String> {
        let reply = {
            let mut state = self.state.lock();
            state.requests.push(RecordedRequest {
                endpoint: Endpoint::DocInfo,
                params: vec![
                    ("sid".to_string(), token.as_str().to_string()),
                    ("page".to_string(), "docInfo".to_string()),
                ],
            });
            let authorized = state
                .account
                .as_ref()
                .map_or(true, |account| account.accepts_session(token.as_str()));
            if authorized {
                state.doc_info.clone().unwrap_or_else(|| Reply::Body("{}".to_string()))
            } else {
                Reply::Status(403)
            }
        };
        Self::answer(reply, "/data.lua").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_account_answers() {
        let account = RouterAccount::new("admin", "äbc").with_block_time(10);

        assert!(account.answer(&[]).contains(NO_SESSION));

        let good = params(&[("username", "admin"), ("response", "1234567z-9e224a41eeefa284df7bb0f26c2913e2")]);
        assert!(account.answer(&good).contains(TEST_SID));

        let bad = params(&[("username", "admin"), ("response", "1234567z-00")]);
        let answer = account.answer(&bad);
        assert!(answer.contains(NO_SESSION));
        assert!(answer.contains("<BlockTime>10</BlockTime>"));
    }

    #[tokio::test]
    async fn test_mock_router_records_and_replays() {
        let router = MockRouter::new();
        router.push_login_reply(Reply::Body("<SessionInfo/>".into()));
        router.push_login_reply(Reply::Timeout);

        assert_eq!(router.login(&[]).await.unwrap(), "<SessionInfo/>");
        let err = router.login(&[("username", "u")]).await.unwrap_err();
        assert!(matches!(err, AgentError::Network { timed_out: true, .. }));

        let requests = router.requests_to(Endpoint::Login);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].param("username"), Some("u"));
    }

    #[tokio::test]
    async fn test_foreign_session_is_forbidden() {
        let router = MockRouter::with_account(RouterAccount::new("admin", "pw"), "{}");
        let token = SessionToken::parse("ffffffffffffffff").unwrap();
        let err = router.doc_info(&token).await.unwrap_err();
        assert!(matches!(err, AgentError::HttpStatus { status: 403, .. }));
    }
}
