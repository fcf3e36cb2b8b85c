//! Lifecycle coordination: wires a line source through the queue to the sender

use crate::batcher::Batcher;
use crate::config::Config;
use crate::errors::{Result, ShipperError};
use crate::event::normalize;
use crate::queue::{EventSender, event_queue};
use crate::session::Session;
use crate::source::{FileFollower, LineSource, ReaderSource};
use crate::transport::HttpTransport;

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error, info, instrument, warn};

/// Streams one line source to one dataspace for the life of the process
pub struct Shipper {
    config: Config,
    session: Session,
    transport: Arc<HttpTransport>,
}

impl Shipper {
    /// Create a shipper with a fresh session
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(ShipperError::Config)?;
        let session = Session::new(&config);
        Self::with_session(config, session)
    }

    pub fn with_session(config: Config, session: Session) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&session, config.http_timeout)?);

        Ok(Self {
            config,
            session,
            transport,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Stream the configured file, or stdin, until a signal arrives or something fails
    pub async fn start(&self) -> Result<()> {
        info!(
            "Streaming session {} as '{}' to {}",
            self.session.id,
            self.session.name,
            self.transport.ingest_url()
        );

        match self.session.search_url() {
            Ok(url) => info!("Follow the stream live at {}", url),
            Err(e) => warn!("Could not build live search url: {}", e),
        }

        match &self.config.file_path {
            Some(path) => {
                let follower = FileFollower::new(path.clone(), self.config.poll_interval);
                info!("Following {}", follower.path().display());
                self.run(follower, shutdown_signal()).await
            }
            None => self.run(ReaderSource::stdin(), shutdown_signal()).await,
        }
    }

    /// Run the pipeline for `source`.
    ///
    /// The sender task is started before the first line is read. When the source
    /// runs out, everything queued is delivered before returning. When `shutdown`
    /// resolves first, queued events are abandoned.
    #[instrument(skip_all, fields(session = %self.session.id))]
    pub async fn run<L, F>(&self, source: L, shutdown: F) -> Result<()>
    where
        L: LineSource,
        F: Future<Output = ()>,
    {
        let (sender, receiver) = event_queue(self.config.queue_capacity);
        let batcher = Batcher::new(
            receiver,
            Arc::clone(&self.transport),
            self.config.batch_limit,
        );
        let mut sender_task = tokio::spawn(batcher.run());
        tokio::pin!(shutdown);

        let result = tokio::select! {
            produced = pump(source, &self.session, sender) => match produced {
                Ok(lines) => {
                    info!("Input exhausted after {} lines, waiting for delivery", lines);
                    tokio::select! {
                        sent = &mut sender_task => flatten(sent),
                        _ = &mut shutdown => {
                            info!("Shutting down before delivery finished");
                            Ok(())
                        }
                    }
                }
                Err(ShipperError::QueueClosed) => {
                    // The sender stopped; its error is the one worth reporting
                    flatten((&mut sender_task).await)?;
                    Err(ShipperError::QueueClosed)
                }
                Err(e) => Err(e),
            },
            sent = &mut sender_task => flatten(sent),
            _ = &mut shutdown => {
                info!("Shutting down");
                Ok(())
            }
        };

        if !sender_task.is_finished() {
            debug!("Abandoning sender task");
            sender_task.abort();
        }

        let metrics = self.transport.metrics().await;
        info!(
            "Delivery metrics - Batches: {}, Events: {}, Failures: {}, Avg duration: {}ms, Max duration: {}ms",
            metrics.batches_sent,
            metrics.events_sent,
            metrics.failures,
            metrics.avg_duration_ms,
            metrics.max_duration_ms.unwrap_or(0)
        );

        result
    }
}

/// Normalize every line from `source` into the queue. Returns the line count.
async fn pump<L: LineSource>(mut source: L, session: &Session, sender: EventSender) -> Result<u64> {
    let mut lines = 0;
    while let Some(line) = source.next_line().await? {
        sender.enqueue(normalize(&line, session)).await?;
        lines += 1;
    }
    Ok(lines)
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| ShipperError::Other(format!("sender task failed: {}", e)))?
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
