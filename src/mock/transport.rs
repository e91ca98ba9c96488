//! Scripted API transport

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::host::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};

#[derive(Debug, Clone)]
enum Scripted {
    Response(ApiResponse),
    ConnectionFailure(String),
}

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<(Method, String), VecDeque<Scripted>>,
    calls: Vec<ApiRequest>,
}

/// In-process transport returning scripted responses
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) -> &Self {
        self.lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
        self
    }

    /// Queue a raw response for `method path`
    pub fn respond(&self, method: Method, path: &str, response: ApiResponse) -> &Self {
        self.push(method, path, Scripted::Response(response))
    }

    /// Queue a JSON response for `method path`
    pub fn respond_json(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.respond(method, path, ApiResponse::json(status, &body))
    }

    /// Queue a connection-level failure for `method path`
    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Scripted::ConnectionFailure(message.to_string()))
    }

    /// Every request seen so far, in order
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of requests seen for `method path`
    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.lock();
        state.calls.push(request.clone());

        let key = (request.method, request.path.clone());
        let scripted = match state.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::ConnectionFailure(message)) => Err(TransportError::ConnectionFailed(message)),
            None => Err(TransportError::ConnectionFailed(format!(
                "no scripted response for {} {}",
                request.method, request.path
            ))),
        }
    }
}
