//! Local HTTP server answering with scripted responses, for exercising the
//! HTTP clients end to end.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use axum::{body::Bytes, extract::State, http::StatusCode, http::Uri, Router};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub uri: String,
    pub body: String,
}

#[derive(Clone, Default)]
struct Script {
    responses: Arc<Mutex<VecDeque<(u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct StubServer {
    pub base_url: String,
    script: Script,
}

impl StubServer {
    /// Serves `responses` in order on every path; the last one repeats.
    pub async fn start(responses: &[(u16, &str)]) -> Self {
        let script = Script {
            responses: Arc::new(Mutex::new(
                responses
                    .iter()
                    .map(|(status, body)| (*status, body.to_string()))
                    .collect(),
            )),
            ..Default::default()
        };

        let app = Router::new().fallback(respond).with_state(script.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            script,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.script.requests.lock().unwrap().len()
    }
}

async fn respond(State(script): State<Script>, uri: Uri, body: Bytes) -> (StatusCode, String) {
    script.requests.lock().unwrap().push(RecordedRequest {
        uri: uri.to_string(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let mut responses = script.responses.lock().unwrap();
    let (status, body) = if responses.len() > 1 {
        responses.pop_front()
    } else {
        responses.front().cloned()
    }
    .unwrap_or((404, String::new()));

    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}
