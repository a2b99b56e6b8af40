#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use sevmeter::api::{Endpoint, MeterApi};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the loopback SEV stand-in answers
#[derive(Clone)]
pub struct Behaviour {
    pub login_status: StatusCode,
    pub login_delay: Duration,
    pub token: String,
    pub endpoint_delay: Duration,
    /// Per endpoint path: status and raw body; unknown paths answer 404
    pub responses: HashMap<String, (StatusCode, String)>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            login_status: StatusCode::OK,
            login_delay: Duration::ZERO,
            token: "jwt-token-1".to_string(),
            endpoint_delay: Duration::ZERO,
            responses: HashMap::new(),
        }
    }
}

impl Behaviour {
    pub fn respond(mut self, path: &str, status: StatusCode, body: Value) -> Self {
        self.responses
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    pub fn respond_raw(mut self, path: &str, status: StatusCode, body: &str) -> Self {
        self.responses
            .insert(path.to_string(), (status, body.to_string()));
        self
    }
}

struct Shared {
    behaviour: Behaviour,
    logins: AtomicUsize,
    calls: AtomicUsize,
    auth_headers: Mutex<Vec<String>>,
    payloads: Mutex<Vec<(String, Value)>>,
}

pub struct FakeSev {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl FakeSev {
    pub fn logins(&self) -> usize {
        self.shared.logins.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.shared.auth_headers.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<(String, Value)> {
        self.shared.payloads.lock().unwrap().clone()
    }
}

async fn login(State(s): State<Arc<Shared>>, Json(body): Json<Value>) -> (StatusCode, String) {
    s.logins.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(s.behaviour.login_delay).await;
    if body["user_name"] != "user" || body["password"] != "key" {
        return (StatusCode::UNAUTHORIZED, "bad credentials".to_string());
    }
    (s.behaviour.login_status, s.behaviour.token.clone())
}

async fn endpoint(
    State(s): State<Arc<Shared>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    s.calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    s.auth_headers.lock().unwrap().push(auth);
    s.payloads.lock().unwrap().push((name.clone(), body));
    tokio::time::sleep(s.behaviour.endpoint_delay).await;
    s.behaviour
        .responses
        .get(&name)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, String::new()))
}

/// Start the stand-in on an ephemeral loopback port
pub async fn spawn(behaviour: Behaviour) -> FakeSev {
    let shared = Arc::new(Shared {
        behaviour,
        logins: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
        auth_headers: Mutex::new(Vec::new()),
        payloads: Mutex::new(Vec::new()),
    });
    let router = Router::new()
        .route("/api/login_and_get_jwt_token", post(login))
        .route("/api/{name}", post(endpoint))
        .with_state(Arc::clone(&shared));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    FakeSev {
        base_url: format!("http://{}/api/", addr),
        shared,
    }
}

pub fn readings(meter_id: &str, values: &[(&str, f64, Option<f64>)]) -> Value {
    let readings: Vec<Value> = values
        .iter()
        .map(|(ts, v, c)| match c {
            Some(c) => json!({"time_stamp": ts, "reading": v, "cumulative_value": c}),
            None => json!({"time_stamp": ts, "reading": v}),
        })
        .collect();
    json!({"meter_id": meter_id, "readings": readings})
}

/// In-process [`MeterApi`] with canned answers and call counting
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<HashMap<Endpoint, Value>>,
    calls: Mutex<Vec<(Endpoint, Value)>>,
    pub delay: Duration,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn set(&self, endpoint: Endpoint, value: Value) {
        self.responses.lock().unwrap().insert(endpoint, value);
    }

    pub fn fail(&self, endpoint: Endpoint) {
        self.responses.lock().unwrap().remove(&endpoint);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(Endpoint, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeterApi for FakeApi {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint, payload.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses.lock().unwrap().get(&endpoint).cloned()
    }
}
