use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use hyper::StatusCode;

use crate::rotation::Endpoint;
use crate::transport::{Transport, TransportError, TransportResponse};

/// Scripted transport: pops one outcome per request and records what was sent.
/// Once the script runs out every request gets a bodiless 200.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    pub requests: Mutex<Vec<(String, Bytes)>>,
    pub close_calls: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(TransportResponse::new(status, body)));
        self
    }

    pub fn fail(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Timeout(Duration::from_millis(10))));
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn bodies(&self) -> Vec<Bytes> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    async fn send_bulk(&self, url: &str, body: Bytes) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push((url.to_owned(), body));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse::new(StatusCode::OK, "")))
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets a test keep a handle on the mock after handing it to a client.
impl Transport for Arc<MockTransport> {
    async fn send_bulk(&self, url: &str, body: Bytes) -> Result<TransportResponse, TransportError> {
        (**self).send_bulk(url, body).await
    }

    fn close(&self) {
        (**self).close();
    }
}

pub fn endpoints(hosts: &[&str]) -> Vec<Endpoint> {
    hosts.iter().map(|h| Endpoint::parse(h).unwrap()).collect()
}
