//! Line-oriented host for [`BulkClient`].
//!
//! Reads one event per input line, batches them through the client and
//! flushes on batch size, on a timer, and once more at shutdown.

use std::io;
use std::ops::ControlFlow;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Split};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::BulkClient;
use crate::config::{ConfigError, RelayConfig};
use crate::event::{Event, TIMESTAMP_HEADER};
use crate::index_name::IndexNamer;
use crate::transport::{HttpTransport, Transport};

/// Counters reported when the relay stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub events: u64,
    pub serialize_failures: u64,
    pub batches_delivered: u64,
    pub batches_failed: u64,
    pub records_lost: u64,
}

pub struct Relay<T: Transport = HttpTransport> {
    client: BulkClient<T>,
    namer: Box<dyn IndexNamer>,
    index_type: String,
    ttl: Option<Duration>,
    batch_size: usize,
    flush_interval: Duration,
    stats: RelayStats,
}

impl Relay<HttpTransport> {
    /// Build the client from the built-in transports and wrap it.
    pub fn from_config(config: RelayConfig) -> Result<Self, ConfigError> {
        let client = BulkClient::configure(config.client.clone(), config.serializer.build())?;
        info!(
            serializer = %config.serializer,
            index_name = %config.index_name,
            batch_size = config.batch_size,
            "Relay configured"
        );
        Ok(Self::with_client(client, &config))
    }
}

impl<T: Transport> Relay<T> {
    pub fn with_client(client: BulkClient<T>, config: &RelayConfig) -> Self {
        Self {
            client,
            namer: config.index_namer.build(&config.index_name),
            index_type: config.index_type.clone(),
            ttl: config.ttl,
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            stats: RelayStats::default(),
        }
    }

    /// Relay `input` until it ends or `cancel` fires, then flush what is left
    /// and close the client.
    ///
    /// Lines are raw bytes; a body that is not UTF-8 is rejected by the
    /// serializer like any other bad event.
    ///
    /// Delivery and serialization failures are counted, never fatal. Only a
    /// read error on `input` is returned, after the final flush.
    pub async fn run<R>(mut self, input: R, cancel: CancellationToken) -> io::Result<RelayStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.split(b'\n');
        let mut ticker = time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            match self.tick(&mut lines, &mut ticker, &cancel).await {
                ControlFlow::Break(result) => break result,
                ControlFlow::Continue(()) => {}
            }
        };

        self.flush().await;
        self.client.close();
        info!(
            events = self.stats.events,
            serialize_failures = self.stats.serialize_failures,
            batches_delivered = self.stats.batches_delivered,
            batches_failed = self.stats.batches_failed,
            records_lost = self.stats.records_lost,
            "Relay stopped"
        );
        result.map(|()| self.stats)
    }

    async fn tick<R>(
        &mut self,
        lines: &mut Split<R>,
        ticker: &mut Interval,
        cancel: &CancellationToken,
    ) -> ControlFlow<io::Result<()>>
    where
        R: AsyncBufRead + Unpin,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Relay cancelled");
                return ControlFlow::Break(Ok(()));
            }
            _ = ticker.tick() => {
                self.flush().await;
            }
            line = lines.next_segment() => {
                match line {
                    Ok(Some(line)) => self.ingest(line).await,
                    Ok(None) => {
                        debug!("Input closed");
                        return ControlFlow::Break(Ok(()));
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read input");
                        return ControlFlow::Break(Err(e));
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn ingest(&mut self, mut line: Vec<u8>) {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        let event = Event::new(line)
            .with_header(TIMESTAMP_HEADER, Utc::now().timestamp_millis().to_string());
        self.stats.events += 1;

        if let Err(e) = self
            .client
            .add_event(&event, self.namer.as_ref(), &self.index_type, self.ttl)
        {
            self.stats.serialize_failures += 1;
            warn!(error = %e, "Dropping event that failed to serialize");
            return;
        }

        if self.client.pending_records() >= self.batch_size {
            self.flush().await;
        }
    }

    async fn flush(&mut self) {
        let records = self.client.pending_records();
        if records == 0 {
            return;
        }
        match self.client.execute().await {
            Ok(()) => self.stats.batches_delivered += 1,
            Err(e) => {
                self.stats.batches_failed += 1;
                self.stats.records_lost += records as u64;
                error!(error = %e, records, "Bulk delivery failed, batch dropped");
            }
        }
    }
}
