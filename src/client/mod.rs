use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use hyper::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffers::{BulkBuffer, Snapshot, WriteOperation};
use crate::config::{ClientConfig, ConfigError};
use crate::event::Event;
use crate::index_name::IndexNamer;
use crate::rotation::{Endpoint, RotationList};
use crate::serializer::{EventSerializer, SerializeError};
use crate::transport::{
    HttpTransport, Transport, TransportError, TransportRegistry, TransportResponse,
};

/// A batch could not be delivered to any endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The last endpoint answered with a non-200 status and a body.
    #[error("{body}")]
    Rejected { status: StatusCode, body: String },

    /// The last endpoint answered with a non-200 status and no body.
    #[error("Elasticsearch status code was: {status}")]
    Status { status: StatusCode },

    /// The last attempt never got a response.
    #[error("all {attempts} bulk attempts failed, last error: {source}")]
    Unreachable {
        attempts: usize,
        #[source]
        source: TransportError,
    },
}

enum Attempt {
    Responded(TransportResponse),
    Failed(TransportError),
}

impl DeliveryError {
    fn from_last(attempt: Attempt, attempts: usize) -> Self {
        match attempt {
            Attempt::Responded(TransportResponse {
                status,
                body: Some(body),
            }) => Self::Rejected { status, body },
            Attempt::Responded(TransportResponse { status, body: None }) => Self::Status { status },
            Attempt::Failed(source) => Self::Unreachable { attempts, source },
        }
    }
}

/// Accumulates bulk index operations and ships them to one of several
/// interchangeable endpoints, failing over in round-robin order.
///
/// `add_event` may be called from any number of tasks or threads while an
/// `execute` is in flight; only the buffer swap is exclusive with appends.
pub struct BulkClient<T: Transport = HttpTransport> {
    endpoints: RotationList<Endpoint>,
    serializer: Box<dyn EventSerializer>,
    buffer: BulkBuffer,
    transport: T,
    closed: AtomicBool,
}

impl BulkClient<HttpTransport> {
    /// Build a client using the built-in transports.
    pub fn configure(
        config: ClientConfig,
        serializer: Box<dyn EventSerializer>,
    ) -> Result<Self, ConfigError> {
        Self::configure_with(config, serializer, &TransportRegistry::builtin())
    }
}

impl<T: Transport> BulkClient<T> {
    /// Build a client, resolving `config.transport` in `registry`.
    pub fn configure_with(
        config: ClientConfig,
        serializer: Box<dyn EventSerializer>,
        registry: &TransportRegistry<T>,
    ) -> Result<Self, ConfigError> {
        let endpoints = RotationList::new(config.endpoints)?;
        let transport = registry.resolve(&config.transport, &config.transport_settings)?;
        info!(
            transport = config.transport,
            endpoints = endpoints.size(),
            "Bulk client configured"
        );
        Ok(Self::from_parts(endpoints, serializer, transport))
    }

    /// Build a client around an already constructed transport.
    pub fn with_transport(
        endpoints: Vec<Endpoint>,
        serializer: Box<dyn EventSerializer>,
        transport: T,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_parts(
            RotationList::new(endpoints)?,
            serializer,
            transport,
        ))
    }

    fn from_parts(
        endpoints: RotationList<Endpoint>,
        serializer: Box<dyn EventSerializer>,
        transport: T,
    ) -> Self {
        Self {
            endpoints,
            serializer,
            buffer: BulkBuffer::new(),
            transport,
            closed: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pending_records(&self) -> usize {
        self.buffer.pending_records()
    }

    /// Serialize `event` and queue it as an `index` operation.
    ///
    /// On error nothing is appended.
    pub fn add_event<N: IndexNamer + ?Sized>(
        &self,
        event: &Event,
        namer: &N,
        index_type: &str,
        ttl: Option<Duration>,
    ) -> Result<(), SerializeError> {
        let payload = self.serializer.serialize(event)?;
        let op = WriteOperation::index(&namer.index_name(event), index_type, ttl, payload)?;
        self.buffer.append(&op);
        Ok(())
    }

    /// Detach everything queued so far and deliver it.
    ///
    /// The detached batch is gone from the client whatever the outcome; a
    /// caller wanting redelivery has to re-add the events.
    pub async fn execute(&self) -> Result<(), DeliveryError> {
        let snapshot = self.buffer.flush();
        if snapshot.is_empty() {
            debug!("No pending bulk operations, skipping request");
            return Ok(());
        }
        self.dispatch(snapshot).await
    }

    /// One pass over the endpoints: stops at the first 200, gives up after
    /// every endpoint has been tried once.
    async fn dispatch(&self, snapshot: Snapshot) -> Result<(), DeliveryError> {
        let records = snapshot.records();
        let body = snapshot.into_bytes();
        let budget = self.endpoints.size();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let endpoint = self.endpoints.next();
            let outcome = self.send(endpoint, attempt, body.clone()).await;

            if let Attempt::Responded(resp) = &outcome
                && resp.status == StatusCode::OK
            {
                if let Some(body) = &resp.body {
                    warn_on_item_errors(endpoint, body);
                }
                debug!(endpoint = %endpoint, records, attempt, "Bulk request accepted");
                return Ok(());
            }

            if attempt >= budget {
                return Err(DeliveryError::from_last(outcome, attempt));
            }
        }
    }

    async fn send(&self, endpoint: &Endpoint, attempt: usize, body: Bytes) -> Attempt {
        match self.transport.send_bulk(&endpoint.bulk_url(), body).await {
            Ok(resp) => {
                info!(
                    endpoint = %endpoint,
                    attempt,
                    status = resp.status.as_u16(),
                    "Status code from Elasticsearch"
                );
                if let Some(body) = &resp.body {
                    debug!(endpoint = %endpoint, body = %body, "Status message from Elasticsearch");
                }
                Attempt::Responded(resp)
            }
            Err(e) => {
                warn!(endpoint = %endpoint, attempt, error = %e, "Bulk request failed");
                Attempt::Failed(e)
            }
        }
    }

    /// Release transport resources. Later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.transport.close();
        debug!("Bulk client closed");
    }
}

/// A 200 bulk response can still carry per-item failures. They are reported,
/// not retried: the batch as a whole was accepted.
fn warn_on_item_errors(endpoint: &Endpoint, body: &str) {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return;
    };
    if parsed.get("errors").and_then(Value::as_bool) != Some(true) {
        return;
    }
    let failed = parsed
        .get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|item| item_failed(item)).count())
        .unwrap_or(0);
    warn!(endpoint = %endpoint, failed, "Bulk response reported item failures");
}

fn item_failed(item: &Value) -> bool {
    item.as_object()
        .and_then(|actions| actions.values().next())
        .map(|result| result.get("error").is_some())
        .unwrap_or(false)
}
