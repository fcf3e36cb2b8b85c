//! Humio Log Streamer Library
//!
//! Follows a file or reads stdin and ships every line as an event to a Humio
//! dataspace, batching through a bounded queue drained by a single sender task.
//! The `query` subcommand runs a search against a dataspace instead.

pub mod batcher;
pub mod config;
pub mod errors;
pub mod event;
pub mod query;
pub mod queue;
pub mod session;
pub mod shipper;
pub mod source;
pub mod transport;

pub use batcher::Batcher;
pub use config::{Cli, Command, Config};
pub use errors::{Result, ShipperError};
pub use event::{Event, EventList, normalize};
pub use query::{QueryArgs, QueryClient, run_query};
pub use queue::{EventReceiver, EventSender, event_queue};
pub use session::Session;
pub use shipper::Shipper;
pub use source::{FileFollower, LineSource, ReaderSource};
pub use transport::{BatchSink, HttpTransport};
