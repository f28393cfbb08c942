//! Batching client for the Elasticsearch `_bulk` API.
//!
//! Events are serialized into `index` operations, buffered, and shipped as a
//! single NDJSON request to one of several interchangeable endpoints, failing
//! over round-robin until one answers 200.

pub mod buffers;
pub mod client;
pub mod config;
pub mod event;
pub mod index_name;
pub mod relay;
pub mod rotation;
pub mod serializer;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{BulkClient, DeliveryError};
pub use config::{ClientConfig, ConfigError, RelayConfig, Settings};
pub use event::Event;
pub use relay::{Relay, RelayStats};
pub use transport::{HttpTransport, Transport, TransportRegistry};
