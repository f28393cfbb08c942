use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::serializer::SerializeError;

#[derive(Serialize)]
struct ActionLine<'a> {
    index: IndexParams<'a>,
}

#[derive(Serialize)]
struct IndexParams<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    doc_type: &'a str,
    #[serde(rename = "_ttl", skip_serializing_if = "Option::is_none")]
    ttl: Option<String>,
}

/// One bulk `index` action: the metadata line followed by the document line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOperation {
    action: String,
    payload: String,
}

impl WriteOperation {
    /// Build the action line for `index`/`doc_type`. A zero or absent TTL is omitted.
    pub fn index(
        index: &str,
        doc_type: &str,
        ttl: Option<Duration>,
        payload: String,
    ) -> Result<Self, SerializeError> {
        let ttl = ttl
            .map(|d| d.as_millis())
            .filter(|ms| *ms > 0)
            .map(|ms| ms.to_string());
        let action = serde_json::to_string(&ActionLine {
            index: IndexParams {
                index,
                doc_type,
                ttl,
            },
        })?;
        Ok(Self { action, payload })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    fn len(&self) -> usize {
        self.action.len() + self.payload.len() + 2
    }
}

#[derive(Debug, Default)]
struct BufferData {
    text: String,
    records: usize,
}

/// Detached contents of a [`BulkBuffer`], exclusively owned by the dispatch path.
#[derive(Debug, Default)]
pub struct Snapshot {
    text: String,
    records: usize,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len_bytes(&self) -> usize {
        self.text.len()
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.text)
    }
}

/// Newline-delimited accumulator of bulk write operations.
///
/// The lock covers appends and the swap in [`flush`](Self::flush) only, never
/// the network call.
#[derive(Debug, Default)]
pub struct BulkBuffer {
    live: Mutex<BufferData>,
}

impl BulkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // `text` is valid UTF-8 after any partial append.
    fn lock(&self) -> MutexGuard<'_, BufferData> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, op: &WriteOperation) {
        let mut guard = self.lock();
        guard.text.reserve(op.len());
        guard.text.push_str(&op.action);
        guard.text.push('\n');
        guard.text.push_str(&op.payload);
        guard.text.push('\n');
        guard.records += 1;
    }

    /// Swap in an empty accumulator and return everything appended so far.
    pub fn flush(&self) -> Snapshot {
        let data = std::mem::take(&mut *self.lock());
        Snapshot {
            text: data.text,
            records: data.records,
        }
    }

    pub fn pending_records(&self) -> usize {
        self.lock().records
    }

    pub fn is_empty(&self) -> bool {
        self.pending_records() == 0
    }
}
