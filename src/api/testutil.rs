//! A canned-response transport for unit tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use serde_json::{Value, json};

use crate::{Transport, TransportError};

/// A request as seen by the transport.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: http::Method,
    pub(crate) uri: http::Uri,
    pub(crate) headers: http::HeaderMap,
    pub(crate) body: Vec<u8>,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<http::Response<Vec<u8>>>,
    requests: Vec<RecordedRequest>,
}

/// Replays queued responses in order, and records every request. Clones
/// share the same queue.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, resp: http::Response<Vec<u8>>) {
        self.state.lock().unwrap().responses.push_back(resp);
    }

    /// Queue a successful envelope around `response`.
    pub(crate) fn push_ok(&self, response: Value) {
        let body = json!({
            "response": response,
            "messages": [{"code": "0", "message": "OK"}],
        });

        self.push(http::Response::new(serde_json::to_vec(&body).unwrap()));
    }

    /// Queue an error envelope.
    pub(crate) fn push_error(&self, status: u16, code: &str, message: &str) {
        let body = json!({
            "response": {},
            "messages": [{"code": code, "message": message}],
        });

        let resp = http::Response::builder()
            .status(status)
            .body(serde_json::to_vec(&body).unwrap())
            .unwrap();
        self.push(resp);
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub(crate) fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("no requests were sent")
    }
}

impl Transport for MockTransport {
    fn execute(
        &self,
        req: http::Request<Vec<u8>>,
    ) -> BoxFuture<'_, Result<http::Response<Vec<u8>>, TransportError>> {
        let mut state = self.state.lock().unwrap();
        let (parts, body) = req.into_parts();
        state.requests.push(RecordedRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        });

        let resp = state
            .responses
            .pop_front()
            .ok_or_else(|| TransportError::connection("no canned response"));
        Box::pin(async move { resp })
    }
}

/// The profile live tests run against, selected with `FMDATA_PROFILE`.
#[cfg(feature = "_integration-tests")]
pub(crate) fn test_profile() -> &'static crate::Profile {
    static PROFILE: std::sync::OnceLock<crate::Profile> = std::sync::OnceLock::new();
    PROFILE.get_or_init(|| {
        crate::Profile::from_default_env()
            .expect("Failed to load test profile. Did you forget to set FMDATA_PROFILE?")
    })
}

/// A server built from the test profile, using the real transport.
#[cfg(feature = "_integration-tests")]
pub(crate) fn live_server() -> Arc<crate::Server> {
    crate::Server::from_profile(test_profile(), crate::UreqTransport::default())
}
