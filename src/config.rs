//! Configuration management for the log streamer

use crate::query::QueryArgs;
use clap::{Args, Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SERVER_URL: &str = "https://cloud.humio.com/";
pub const DEFAULT_DATASPACE: &str = "scratch";
pub const DEFAULT_BATCH_LIMIT: usize = 500;
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// Command line interface
#[derive(Debug, Parser)]
#[command(
    name = "humio",
    version,
    about = "Stream a file or stdin to a Humio dataspace, or query one"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub stream: StreamArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a search against a dataspace and print the result
    Query(QueryArgs),
}

/// Options for streaming lines into a dataspace
#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Your Humio API token
    #[arg(short, long, env = "HUMIO_API_TOKEN", default_value = "")]
    pub token: String,

    /// The dataspace to stream to. Defaults to your scratch dataspace.
    #[arg(short, long, env = "HUMIO_DATASPACE", default_value = DEFAULT_DATASPACE)]
    pub dataspace: String,

    /// URL for the Humio server to stream to. Must end with a slash (/).
    #[arg(short, long, env = "HUMIO_URL", default_value = DEFAULT_SERVER_URL)]
    pub url: String,

    /// Name to find this stream by (@name=NAME). Defaults to the tailed file path.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Maximum number of events per ingest request
    #[arg(long, env = "HUMIO_BATCH_LIMIT", default_value_t = DEFAULT_BATCH_LIMIT)]
    pub batch_limit: usize,

    /// Number of events buffered before the reader blocks
    #[arg(long, env = "HUMIO_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// How often a followed file is checked for new data
    #[arg(long, default_value_t = 250)]
    pub poll_interval_ms: u64,

    /// Request timeout in seconds; unset keeps the HTTP client default
    #[arg(long)]
    pub http_timeout: Option<u64>,

    /// File to follow. Reads stdin when omitted.
    pub filepath: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the ingest API
    pub auth_token: String,

    /// Base URL of the server, ending in '/'
    pub server_url: String,

    /// Target dataspace
    pub dataspace_id: String,

    /// Value of the @name attribute
    pub name: String,

    /// File to follow, stdin when None
    pub file_path: Option<PathBuf>,

    pub batch_limit: usize,

    pub queue_capacity: usize,

    pub poll_interval: Duration,

    pub http_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_token: String::new(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            dataspace_id: DEFAULT_DATASPACE.to_string(),
            name: String::new(),
            file_path: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(250),
            http_timeout: None,
        }
    }
}

impl From<StreamArgs> for Config {
    fn from(args: StreamArgs) -> Self {
        // An explicit name wins; otherwise the tailed file names the stream.
        let name = match (args.name, &args.filepath) {
            (Some(name), _) if !name.is_empty() => name,
            (_, Some(path)) => path.display().to_string(),
            _ => String::new(),
        };

        Self {
            auth_token: args.token,
            server_url: args.url,
            dataspace_id: args.dataspace,
            name,
            file_path: args.filepath,
            batch_limit: args.batch_limit,
            queue_capacity: args.queue_capacity,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            http_timeout: args.http_timeout.map(Duration::from_secs),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.server_url.ends_with('/') {
            return Err(format!("url must end with '/': {}", self.server_url));
        }

        if let Err(e) = Url::parse(&self.server_url) {
            return Err(format!("url is not valid ({}): {}", e, self.server_url));
        }

        if self.dataspace_id.is_empty() {
            return Err("dataspace cannot be empty".to_string());
        }

        if self.batch_limit == 0 {
            return Err("batch_limit must be greater than 0".to_string());
        }

        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }

        if self.auth_token.is_empty() {
            warn!("No API token given, requests will most likely be rejected");
        }

        Ok(())
    }
}
