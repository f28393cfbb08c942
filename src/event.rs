use std::collections::BTreeMap;

use bytes::Bytes;

/// Header carrying the event time as epoch milliseconds.
pub const TIMESTAMP_HEADER: &str = "timestamp";

/// A stream event: string headers plus an opaque body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl Event {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The `timestamp` header parsed as epoch milliseconds, if present and numeric.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.header(TIMESTAMP_HEADER)?.trim().parse().ok()
    }
}
