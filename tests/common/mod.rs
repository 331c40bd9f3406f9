// ABOUTME: Local Looker API stand-in for integration tests, served by an axum router
// ABOUTME: Records every request and answers with canned responses in order

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string, e.g. `/api/3.1/login?client_id=abc`.
    pub target: String,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body should be JSON")
    }
}

#[derive(Default)]
struct Recorder {
    requests: Vec<RecordedRequest>,
    responses: VecDeque<(StatusCode, String)>,
}

type SharedRecorder = Arc<Mutex<Recorder>>;

pub struct MockServer {
    host_url: String,
    recorder: SharedRecorder,
}

impl MockServer {
    /// Serves `responses` in order, one per incoming request. Requests past
    /// the end of the script get a 500 with an explanatory body.
    pub async fn start(responses: Vec<(u16, &str)>) -> Self {
        let responses = responses
            .into_iter()
            .map(|(status, body)| {
                let status = StatusCode::from_u16(status).expect("valid status code");
                (status, body.to_string())
            })
            .collect();
        let recorder: SharedRecorder = Arc::new(Mutex::new(Recorder {
            requests: Vec::new(),
            responses,
        }));

        let app = Router::new()
            .fallback(respond)
            .with_state(recorder.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server failed");
        });

        Self {
            host_url: format!("http://{}", addr),
            recorder,
        }
    }

    /// Host URL as a user would configure it (no API path).
    pub fn host_url(&self) -> String {
        self.host_url.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorder.lock().unwrap().requests.clone()
    }
}

async fn respond(
    State(recorder): State<SharedRecorder>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let mut recorder = recorder.lock().unwrap();
    recorder.requests.push(RecordedRequest {
        method: method.to_string(),
        target: target.clone(),
        headers,
        body,
    });
    let (status, body) = recorder.responses.pop_front().unwrap_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{{\"message\":\"no canned response for {}\"}}", target),
        )
    });

    (status, [(header::CONTENT_TYPE, "application/json")], body)
}
