//! Search client: runs a query against a dataspace and streams the result

use crate::errors::{Result, ShipperError};
use clap::Args;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

pub const DEFAULT_HOSTPORT: &str = "cloud.humio.com:443";
pub const DEFAULT_QUERY_DATASPACE: &str = "developer";

/// Options for the `query` subcommand
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Query string, e.g. 'error | count()'
    pub query: String,

    /// Search from this point in time. Accepts epochs, ISO8601 timestamps and
    /// relative offsets such as 2hours, 3s.
    #[arg(short, long, default_value = "5minutes")]
    pub from: String,

    /// Search to this point in time
    #[arg(short, long, default_value = "now")]
    pub to: String,

    /// Run as a live streaming query
    #[arg(short, long)]
    pub live: bool,

    /// Log the request before sending it
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the query as a curl command and exit
    #[arg(long)]
    pub curl: bool,

    /// Dataspace to query
    #[arg(long, default_value = DEFAULT_QUERY_DATASPACE)]
    pub dataspace: String,

    /// The host:port where Humio can be reached
    #[arg(long, default_value = DEFAULT_HOSTPORT)]
    pub hostport: String,

    /// API token, sent as a bearer token when set
    #[arg(long, env = "HUMIO_API_TOKEN", default_value = "")]
    pub token: String,
}

/// Body of a search request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query_string: String,
    pub start: String,
    pub end: String,
    pub is_live: bool,
}

impl From<&QueryArgs> for QueryRequest {
    fn from(args: &QueryArgs) -> Self {
        Self {
            query_string: args.query.clone(),
            start: args.from.clone(),
            end: args.to.clone(),
            is_live: args.live,
        }
    }
}

pub struct QueryClient {
    client: Client,
    url: String,
    token: String,
    request: QueryRequest,
    verbose: bool,
}

impl QueryClient {
    pub fn new(args: &QueryArgs) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("humio_streamer/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ShipperError::Http)?;

        Ok(Self {
            client,
            url: query_url(&args.hostport, &args.dataspace),
            token: args.token.clone(),
            request: QueryRequest::from(args),
            verbose: args.verbose,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", "application/json".to_string()),
            ("Accept", "text/plain".to_string()),
        ];
        if !self.token.is_empty() {
            headers.push(("Authorization", format!("Bearer {}", self.token)));
        }
        headers
    }

    /// The same request as a shell command line
    pub fn curl_command(&self) -> Result<String> {
        let body = serde_json::to_string(&self.request)?;

        let mut command = String::from("curl");
        for (name, value) in self.headers() {
            command.push_str(&format!(" -H \"{}: {}\"", name, value));
        }
        command.push_str(&format!(
            " -XPOST -d '{}' {}",
            body.replace('\'', r"'\''"),
            self.url
        ));
        Ok(command)
    }

    /// POST the query and copy the response body to `out` as it arrives.
    ///
    /// A status of 300 or above is returned as `Rejected` with the body.
    pub async fn run<W: AsyncWrite + Unpin>(&self, out: &mut W) -> Result<()> {
        let body = serde_json::to_vec(&self.request)?;

        if self.verbose {
            info!("URL: {}", self.url);
            info!("Headers: {:?}", self.headers());
            info!("Body: {}", String::from_utf8_lossy(&body));
        }

        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/plain")
            .body(body);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await.map_err(ShipperError::Http)?;
        let status = response.status().as_u16();

        if status >= 300 {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read response body: {}>", e));
            return Err(ShipperError::Rejected { status, body });
        }

        let bytes = copy_body(response, out).await?;
        debug!("Query returned {} bytes", bytes);

        // End with a newline
        out.write_all(b"\n").await?;
        out.flush().await?;
        Ok(())
    }
}

async fn copy_body<W: AsyncWrite + Unpin>(mut response: Response, out: &mut W) -> Result<u64> {
    let mut total = 0;
    while let Some(chunk) = response.chunk().await.map_err(ShipperError::Http)? {
        out.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    Ok(total)
}

/// Query endpoint for a dataspace; port 443 is spoken to over TLS
fn query_url(hostport: &str, dataspace: &str) -> String {
    let scheme = if hostport.ends_with(":443") {
        "https"
    } else {
        "http"
    };
    format!(
        "{}://{}/api/v1/dataspaces/{}/query",
        scheme, hostport, dataspace
    )
}

/// Entry point for the `query` subcommand: result goes to stdout
pub async fn run_query(args: &QueryArgs) -> Result<()> {
    let client = QueryClient::new(args)?;
    let mut stdout = tokio::io::stdout();

    if args.curl {
        let command = client.curl_command()?;
        stdout.write_all(command.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        return Ok(());
    }

    client.run(&mut stdout).await
}
