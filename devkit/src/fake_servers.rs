/*!
In-process HTTP fakes for end-to-end tests

- `FakeFritzBox` serves `/login_sid.lua` and `/data.lua` from a `RouterAccount`
- `FakeInflux` serves `/ping` and `/api/v2/write` and keeps every write

Both bind `127.0.0.1:0` and stop when dropped.
*/

use crate::router_stub::{Endpoint, RecordedRequest, RouterAccount};
use anyhow::Result;
use axum::extract::{Form, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

async fn serve(app: Router) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::warn!("fake server stopped: {}", e);
        }
    });
    Ok((addr, handle))
}

fn sorted(params: HashMap<String, String>) -> Vec<(String, String)> {
    let mut params: Vec<_> = params.into_iter().collect();
    params.sort();
    params
}

#[derive(Clone)]
struct FritzState {
    account: RouterAccount,
    doc_info: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Fake FRITZ!Box web interface
pub struct FakeFritzBox {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl FakeFritzBox {
    pub async fn spawn(account: RouterAccount, doc_info_json: impl Into<String>) -> Result<Self> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FritzState {
            account,
            doc_info: doc_info_json.into(),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/login_sid.lua", get(fritz_login))
            .route("/data.lua", post(fritz_data))
            .with_state(state);

        let (addr, handle) = serve(app).await?;
        log::info!("[FAKE] FRITZ!Box listening on http://{}", addr);
        Ok(Self { addr, requests, handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, endpoint: Endpoint) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.endpoint == endpoint).collect()
    }
}

impl Drop for FakeFritzBox {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn fritz_login(
    State(state): State<FritzState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let params = sorted(params);
    let body = state.account.answer(&params);
    state.requests.lock().push(RecordedRequest {
        endpoint: Endpoint::Login,
        params,
    });
    ([(CONTENT_TYPE, "text/xml")], body)
}

async fn fritz_data(
    State(state): State<FritzState>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let authorized = form
        .get("sid")
        .is_some_and(|sid| state.account.accepts_session(sid));
    let page_ok = form.get("page").map(String::as_str) == Some("docInfo");
    state.requests.lock().push(RecordedRequest {
        endpoint: Endpoint::DocInfo,
        params: sorted(form),
    });

    if !authorized {
        return (StatusCode::FORBIDDEN, [(CONTENT_TYPE, "text/html")], "Forbidden".to_string());
    }
    if !page_ok {
        return (StatusCode::NOT_FOUND, [(CONTENT_TYPE, "text/html")], "Not Found".to_string());
    }
    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], state.doc_info.clone())
}

/// One request received on `/api/v2/write`
#[derive(Debug, Clone)]
pub struct InfluxWrite {
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub body: String,
}

impl InfluxWrite {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn lines(&self) -> Vec<&str> {
        self.body.lines().collect()
    }
}

#[derive(Clone)]
struct InfluxState {
    write_status: StatusCode,
    writes: Arc<Mutex<Vec<InfluxWrite>>>,
    pings: Arc<Mutex<usize>>,
}

/// Fake InfluxDB v2 write API
pub struct FakeInflux {
    addr: SocketAddr,
    writes: Arc<Mutex<Vec<InfluxWrite>>>,
    pings: Arc<Mutex<usize>>,
    handle: JoinHandle<()>,
}

impl FakeInflux {
    /// Accepts every write with 204
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_status(204).await
    }

    /// Answers every write with `status`
    pub async fn spawn_with_status(status: u16) -> Result<Self> {
        let write_status = StatusCode::from_u16(status)?;
        let writes = Arc::new(Mutex::new(Vec::new()));
        let pings = Arc::new(Mutex::new(0));
        let state = InfluxState {
            write_status,
            writes: writes.clone(),
            pings: pings.clone(),
        };

        let app = Router::new()
            .route("/ping", get(influx_ping))
            .route("/api/v2/write", post(influx_write))
            .with_state(state);

        let (addr, handle) = serve(app).await?;
        log::info!("[FAKE] InfluxDB listening on http://{}", addr);
        Ok(Self { addr, writes, pings, handle })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn writes(&self) -> Vec<InfluxWrite> {
        self.writes.lock().clone()
    }

    pub fn ping_count(&self) -> usize {
        *self.pings.lock()
    }
}

impl Drop for FakeInflux {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn influx_ping(State(state): State<InfluxState>) -> StatusCode {
    *state.pings.lock() += 1;
    StatusCode::NO_CONTENT
}

async fn influx_write(
    State(state): State<InfluxState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.writes.lock().push(InfluxWrite {
        query: sorted(query),
        authorization,
        body,
    });

    if state.write_status.is_success() {
        (state.write_status, String::new())
    } else {
        (
            state.write_status,
            r#"{"code":"invalid","message":"rejected by fake"}"#.to_string(),
        )
    }
}
