//! Shared fixtures: mock SalesRabbit API and recording publisher

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use kafka_producer::EventPublisher;
use salesrabbit_source::{SalesRabbitClient, SalesRabbitOpts};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sync_core::{StagedRecord, SyncError};
use tokio::net::TcpListener;
use tower::ServiceBuilder;

/// Scripted reply for one page number
#[derive(Clone)]
pub enum Reply {
    Page(Value),
    NotModified,
    Status(StatusCode),
}

/// A request the mock API received
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub endpoint: &'static str,
    pub page: String,
    pub if_modified_since: Option<String>,
}

#[derive(Clone, Default)]
struct MockState {
    replies: Arc<HashMap<&'static str, Vec<Reply>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

pub struct MockApi {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockApi {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn client(&self) -> SalesRabbitClient {
        let mut opts = SalesRabbitOpts::new("e2e-token");
        opts.base_url = self.base_url.clone();
        SalesRabbitClient::new(opts).unwrap()
    }
}

async fn serve_page(
    endpoint: &'static str,
    state: MockState,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Response {
    let page = query.get("page").cloned().unwrap_or_default();
    state.seen.lock().unwrap().push(SeenRequest {
        endpoint,
        page: page.clone(),
        if_modified_since: headers
            .get("if-modified-since")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let reply = page
        .parse::<usize>()
        .ok()
        .and_then(|p| p.checked_sub(1))
        .and_then(|idx| state.replies.get(endpoint)?.get(idx).cloned());

    match reply {
        Some(Reply::Page(body)) => (StatusCode::OK, Json(body)).into_response(),
        Some(Reply::NotModified) => StatusCode::NOT_MODIFIED.into_response(),
        Some(Reply::Status(status)) => (status, "scripted failure").into_response(),
        None => (StatusCode::NOT_FOUND, "no such page").into_response(),
    }
}

/// Start a mock API with scripted pages for `leads` and `leadStatusHistories`.
pub async fn start_mock_api(leads: Vec<Reply>, histories: Vec<Reply>) -> MockApi {
    let state = MockState {
        replies: Arc::new(HashMap::from([
            ("leads", leads),
            ("leadStatusHistories", histories),
        ])),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let seen = state.seen.clone();

    let app = Router::new()
        .route(
            "/leads",
            get(
                |State(state): State<MockState>,
                 Query(q): Query<HashMap<String, String>>,
                 headers: HeaderMap| serve_page("leads", state, q, headers),
            ),
        )
        .route(
            "/leadStatusHistories",
            get(
                |State(state): State<MockState>,
                 Query(q): Query<HashMap<String, String>>,
                 headers: HeaderMap| serve_page("leadStatusHistories", state, q, headers),
            ),
        )
        .with_state(state)
        .layer(ServiceBuilder::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockApi {
        base_url: format!("http://{addr}"),
        seen,
    }
}

/// A page of the leads endpoint
pub fn page(data: Value, more_pages: bool, current_page: u32) -> Reply {
    Reply::Page(json!({
        "data": data,
        "meta": {"morePages": more_pages, "currentPage": current_page}
    }))
}

pub fn lead(id: i64, status: &str, date_modified: &str) -> Value {
    json!({
        "id": id,
        "userId": 12,
        "userName": "Field Rep",
        "firstName": "Lead",
        "lastName": format!("Number {id}"),
        "city": "Provo",
        "state": "UT",
        "latitude": 40.2338,
        "longitude": -111.6585,
        "status": status,
        "dateCreated": "2021-08-01T09:00:00+00:00",
        "dateModified": date_modified,
        "customFields": {"roofType": "tile", "stories": 2},
        "integrationData": [{"system": "crm", "externalId": format!("ext-{id}")}]
    })
}

pub fn history(status_id: i64, status: &str, date_created: &str) -> Value {
    json!({
        "statusId": status_id,
        "status": status,
        "userId": 12,
        "userName": "Field Rep",
        "dateCreated": date_created
    })
}

pub fn record(value: Value) -> StagedRecord {
    value.as_object().cloned().unwrap()
}

/// Publisher that keeps every message, optionally failing from the nth call.
#[derive(Default)]
pub struct RecordingPublisher {
    pub messages: Mutex<Vec<(String, Value)>>,
    fail_from_call: Option<usize>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_from_call(n: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_from_call: Some(n),
        }
    }

    pub fn messages(&self) -> Vec<(String, Value)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), SyncError> {
        let mut messages = self.messages.lock().unwrap();
        if self.fail_from_call.is_some_and(|n| messages.len() + 1 >= n) {
            return Err(SyncError::PublishFailure {
                message: "broker unavailable".to_string(),
            });
        }
        messages.push((key.to_string(), serde_json::from_slice(payload).unwrap()));
        Ok(())
    }
}
