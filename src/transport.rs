//! HTTP transport for delivering event batches to the ingest endpoint

use crate::errors::{Result, ShipperError};
use crate::event::{Event, EventList};
use crate::session::Session;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Destination for completed batches
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Deliver one batch atomically: one request, all or nothing
    async fn send_batch(&self, events: Vec<Event>) -> Result<()>;
}

/// HTTP transport for event batches
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    ingest_url: String,
    auth_token: String,
    metrics: TransportMetrics,
}

impl HttpTransport {
    /// Create a new HTTP transport for the session's dataspace
    pub fn new(session: &Session, http_timeout: Option<Duration>) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(format!("humio_streamer/{}", env!("CARGO_PKG_VERSION")));
        if let Some(http_timeout) = http_timeout {
            builder = builder.timeout(http_timeout);
        }
        let client = builder.build().map_err(ShipperError::Http)?;

        Ok(Self {
            client,
            ingest_url: session.ingest_url(),
            auth_token: session.auth_token.clone(),
            metrics: TransportMetrics::new(),
        })
    }

    pub fn ingest_url(&self) -> &str {
        &self.ingest_url
    }

    /// Serialize and POST a batch. No retries: every failure is returned.
    async fn post_batch(&self, batch: &EventList) -> Result<()> {
        // The endpoint takes an array of event lists; we always send exactly one.
        let body = serde_json::to_vec(&[batch])?;

        debug!(
            "Sending batch with {} events ({} bytes) to {}",
            batch.len(),
            body.len(),
            self.ingest_url
        );

        let response = self
            .client
            .post(&self.ingest_url)
            .bearer_auth(&self.auth_token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(ShipperError::Http)?;

        self.handle_response(response).await
    }

    /// Classify the response; anything from 400 up is a rejection
    async fn handle_response(&self, response: Response) -> Result<()> {
        let status = response.status();

        if status.as_u16() < 400 {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {}>", e));

        Err(ShipperError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn metrics(&self) -> TransportMetricsSnapshot {
        self.metrics.snapshot().await
    }
}

#[async_trait]
impl BatchSink for HttpTransport {
    async fn send_batch(&self, events: Vec<Event>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let batch = EventList::new(events);
        let start_time = Instant::now();

        match self.post_batch(&batch).await {
            Ok(()) => {
                self.metrics
                    .record_success(batch.len(), start_time.elapsed())
                    .await;
                Ok(())
            }
            Err(e) => {
                self.metrics.record_failure(start_time.elapsed()).await;
                error!("Failed to deliver batch of {} events: {}", batch.len(), e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<T: BatchSink + ?Sized> BatchSink for std::sync::Arc<T> {
    async fn send_batch(&self, events: Vec<Event>) -> Result<()> {
        (**self).send_batch(events).await
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    batches: u64,
    events: u64,
    failures: u64,
    total_duration: Duration,
    max_duration: Option<Duration>,
}

/// Delivery counters
#[derive(Debug)]
struct TransportMetrics {
    state: RwLock<MetricsState>,
}

impl TransportMetrics {
    fn new() -> Self {
        Self {
            state: RwLock::new(MetricsState::default()),
        }
    }

    async fn record_success(&self, events: usize, duration: Duration) {
        let mut state = self.state.write().await;
        state.batches += 1;
        state.events += events as u64;
        Self::update_duration_stats(&mut state, duration);
    }

    async fn record_failure(&self, duration: Duration) {
        let mut state = self.state.write().await;
        state.failures += 1;
        Self::update_duration_stats(&mut state, duration);
    }

    fn update_duration_stats(state: &mut MetricsState, duration: Duration) {
        state.total_duration += duration;
        state.max_duration = Some(state.max_duration.map_or(duration, |m| m.max(duration)));
    }

    async fn snapshot(&self) -> TransportMetricsSnapshot {
        let state = self.state.read().await;
        let attempts = state.batches + state.failures;

        let avg_nanos = state
            .total_duration
            .as_nanos()
            .checked_div(u128::from(attempts))
            .unwrap_or(0);
        let avg_duration = Duration::from_nanos(u64::try_from(avg_nanos).unwrap_or(u64::MAX));

        TransportMetricsSnapshot {
            batches_sent: state.batches,
            events_sent: state.events,
            failures: state.failures,
            avg_duration_ms: avg_duration.as_millis() as u64,
            max_duration_ms: state.max_duration.map(|d| d.as_millis() as u64),
        }
    }
}

/// Snapshot of transport metrics
#[derive(Debug, Clone, PartialEq)]
pub struct TransportMetricsSnapshot {
    pub batches_sent: u64,
    pub events_sent: u64,
    pub failures: u64,
    pub avg_duration_ms: u64,
    pub max_duration_ms: Option<u64>,
}
