//! In-process stand-ins for the alert-lookup and mail services.
//!
//! Each [`MockServices`] binds an axum server to `127.0.0.1:0` and records
//! every request it receives so tests can assert on call counts and bodies.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};

use herald_events::{AlertsClient, MailConfig, MailDispatcher, Pipeline, TemplateRenderer};

pub const TEST_TOKEN: &str = "test-token";

/// A mail request as seen by the mock mail service.
#[derive(Debug, Clone)]
pub struct RecordedMail {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

/// Canned behaviour for the mock services.
#[derive(Clone)]
pub struct MockBehaviour {
    pub alerts_status: StatusCode,
    pub alerts_body: String,
    pub alerts_delay: Duration,
    pub mail_status: StatusCode,
}

impl MockBehaviour {
    /// Lookup answers 200 with `alerts`; mail accepts everything.
    pub fn with_alerts(alerts: serde_json::Value) -> Self {
        Self {
            alerts_status: StatusCode::OK,
            alerts_body: alerts.to_string(),
            alerts_delay: Duration::ZERO,
            mail_status: StatusCode::OK,
        }
    }
}

#[derive(Clone)]
struct MockState {
    behaviour: MockBehaviour,
    lookups: Arc<Mutex<Vec<HashMap<String, String>>>>,
    mails: Arc<Mutex<Vec<RecordedMail>>>,
}

/// Running mock services.
pub struct MockServices {
    addr: SocketAddr,
    state: MockState,
}

impl MockServices {
    pub async fn start(behaviour: MockBehaviour) -> Self {
        let state = MockState {
            behaviour,
            lookups: Arc::default(),
            mails: Arc::default(),
        };

        let app = Router::new()
            .route("/alerts", get(alerts))
            .route("/api/send", post(send))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock services");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self { addr, state }
    }

    pub fn alerts_url(&self) -> String {
        format!("http://{}/alerts", self.addr)
    }

    pub fn mail_url(&self) -> String {
        format!("http://{}/api/send", self.addr)
    }

    /// Query parameters of every lookup request received.
    pub fn lookups(&self) -> Vec<HashMap<String, String>> {
        self.state.lookups.lock().unwrap().clone()
    }

    /// Every mail request received.
    pub fn mails(&self) -> Vec<RecordedMail> {
        self.state.mails.lock().unwrap().clone()
    }

    /// Pipeline wired to these services with the given request timeout.
    pub fn pipeline(&self, timeout: Duration) -> Pipeline<AlertsClient, MailDispatcher> {
        let lookup = AlertsClient::new(self.alerts_url(), timeout).expect("alerts client");
        let mailer = MailDispatcher::new(MailConfig {
            api_url: self.mail_url(),
            auth_token: TEST_TOKEN.to_string(),
            timeout,
        })
        .expect("mail dispatcher");
        Pipeline::new(lookup, mailer, TemplateRenderer::new().expect("renderer"))
    }
}

async fn alerts(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.lookups.lock().unwrap().push(params);
    if !state.behaviour.alerts_delay.is_zero() {
        tokio::time::sleep(state.behaviour.alerts_delay).await;
    }
    (
        state.behaviour.alerts_status,
        state.behaviour.alerts_body.clone(),
    )
}

async fn send(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .mails
        .lock()
        .unwrap()
        .push(RecordedMail { authorization, body });
    state.behaviour.mail_status
}
