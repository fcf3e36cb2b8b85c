//! Line sources: a followed file or a plain stream such as stdin

use crate::errors::{Result, ShipperError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};
use tokio::time::{Duration, sleep};
use tracing::{debug, info};

/// Lazy sequence of text lines
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator; `None` once the source is exhausted
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Reads lines from a finite or unbounded stream until end of stream
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl ReaderSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        info!("Attached to stdin");
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for ReaderSource<R> {
    async fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| ShipperError::Source(format!("failed to read input: {}", e)))?;

        if bytes_read == 0 {
            return Ok(None);
        }

        Ok(Some(decode_line(&self.buf)))
    }
}

/// Follows a growing file from its start, waiting for appended data.
///
/// Only complete lines are returned; a trailing fragment without a newline is
/// held back until the rest of it is written. Invalid UTF-8 is replaced, not
/// rejected. A file that shrinks below the read position is treated as
/// truncated and read again from the beginning.
pub struct FileFollower {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    position: u64,
    partial: Vec<u8>,
    poll_interval: Duration,
}

impl FileFollower {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            reader: None,
            position: 0,
            partial: Vec::new(),
            poll_interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_at(&mut self, position: u64) -> Result<BufReader<File>> {
        let mut file = File::open(&self.path).await.map_err(|e| {
            ShipperError::Source(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        file.seek(SeekFrom::Start(position)).await?;

        self.position = position;
        Ok(BufReader::new(file))
    }

    /// Check whether the file shrank below what we already consumed
    async fn truncated(&self) -> Result<bool> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            ShipperError::Source(format!("cannot stat {}: {}", self.path.display(), e))
        })?;
        Ok(metadata.len() < self.position)
    }
}

#[async_trait]
impl LineSource for FileFollower {
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            let mut reader = match self.reader.take() {
                Some(reader) => reader,
                None => self.open_at(0).await?,
            };

            let read = reader.read_until(b'\n', &mut self.partial).await;
            self.reader = Some(reader);
            let bytes_read = read.map_err(|e| {
                ShipperError::Source(format!("failed to read {}: {}", self.path.display(), e))
            })?;
            self.position += bytes_read as u64;

            if self.partial.ends_with(b"\n") {
                let line = decode_line(&self.partial);
                self.partial.clear();
                return Ok(Some(line));
            }

            if bytes_read > 0 {
                // Fragment without newline; keep reading
                continue;
            }

            if self.truncated().await? {
                debug!("File appears to have been truncated, reading from the start");
                self.partial.clear();
                self.reader = None;
                continue;
            }

            sleep(self.poll_interval).await;
        }
    }
}

/// Drop the line terminator and decode, replacing invalid UTF-8
fn decode_line(bytes: &[u8]) -> String {
    let line = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
