//! HTTP access to the router's web interface
//!
//! Two endpoints are used:
//! - `GET  <base>/login_sid.lua` (optionally with `username` + `response`)
//! - `POST <base>/data.lua` with form `sid` + `page=docInfo`
//!
//! Certificate validation is relaxed by default since routers ship
//! self-signed certificates.

use crate::auth::SessionToken;
use crate::config::RouterConfig;
use crate::docinfo::DocInfo;
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

pub const LOGIN_PATH: &str = "/login_sid.lua";
pub const DATA_PATH: &str = "/data.lua";
pub const DOC_INFO_PAGE: &str = "docInfo";

/// Raw request/response exchange with the router.
///
/// Implementations return response bodies; interpreting them is left to
/// [`crate::auth`] and [`crate::docinfo`].
#[async_trait]
pub trait RouterTransport: Send + Sync {
    /// GET the login endpoint with the given query parameters.
    async fn login(&self, query: &[(&str, &str)]) -> AgentResult<String>;

    /// POST the docInfo page request for an authenticated session.
    async fn doc_info(&self, token: &SessionToken) -> AgentResult<String>;
}

/// reqwest-backed [`RouterTransport`]
#[derive(Debug, Clone)]
pub struct HttpRouterClient {
    client: Client,
    base_url: String,
    login_timeout: Duration,
    data_timeout: Duration,
}

impl HttpRouterClient {
    pub fn new(config: &RouterConfig) -> AgentResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .connect_timeout(Duration::from_secs(config.login_timeout_secs))
            .build()
            .map_err(|e| AgentError::config(format!("could not build router HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            login_timeout: Duration::from_secs(config.login_timeout_secs),
            data_timeout: Duration::from_secs(config.data_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RouterTransport for HttpRouterClient {
    async fn login(&self, query: &[(&str, &str)]) -> AgentResult<String> {
        let url = self.url(LOGIN_PATH);
        debug!("GET {} ({} query parameters)", url, query.len());

        let response = self
            .client
            .get(&url)
            .query(query)
            .timeout(self.login_timeout)
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(&format!("connecting to {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::HttpStatus {
                url,
                status: status.as_u16(),
                hint: None,
            });
        }

        response
            .text()
            .await
            .map_err(|e| AgentError::from_reqwest("reading login response", e))
    }

    async fn doc_info(&self, token: &SessionToken) -> AgentResult<String> {
        let url = self.url(DATA_PATH);
        debug!("POST {} (page={})", url, DOC_INFO_PAGE);

        let response = self
            .client
            .post(&url)
            .form(&[("sid", token.as_str()), ("page", DOC_INFO_PAGE)])
            .timeout(self.data_timeout)
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(&format!("connecting to {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Received text on error: {}", body);
            let hint = (status.as_u16() == 403).then(|| {
                "session id invalid or expired, or the user lacks access to page=docInfo"
                    .to_string()
            });
            return Err(AgentError::HttpStatus {
                url,
                status: status.as_u16(),
                hint,
            });
        }

        response
            .text()
            .await
            .map_err(|e| AgentError::from_reqwest("reading docInfo response", e))
    }
}

/// Fetch and parse the DOCSIS channel overview for a session.
pub async fn fetch_doc_info<T>(transport: &T, token: &SessionToken) -> AgentResult<DocInfo>
where
    T: RouterTransport + ?Sized,
{
    let body = transport.doc_info(token).await?;
    let info = DocInfo::from_json(&body)?;
    info!("Fetched DOCSIS info ({} channels)", info.channel_count());
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let config = RouterConfig {
            base_url: "http://192.168.178.1/".into(),
            ..RouterConfig::default()
        };
        let client = HttpRouterClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://192.168.178.1");
        assert_eq!(client.url(LOGIN_PATH), "http://192.168.178.1/login_sid.lua");
    }

    #[tokio::test]
    async fn test_unreachable_router_is_network_error() {
        let config = RouterConfig {
            base_url: "http://127.0.0.1:9".into(),
            login_timeout_secs: 2,
            ..RouterConfig::default()
        };
        let client = HttpRouterClient::new(&config).unwrap();
        let err = client.login(&[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Network { .. }));
    }
}
