//! Newline-delimited JSON-RPC over stdio.

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// One line read from the client
#[derive(Debug)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// The line was not a valid JSON-RPC request
    Malformed(String),
    /// Blank line
    Empty,
}

/// Line transport over any async reader/writer pair.
///
/// Stdout is reserved for protocol messages; logs go to stderr.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read the next line; `None` on EOF
    pub async fn read_request(&mut self) -> io::Result<Option<Incoming>> {
        let mut raw = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut raw).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Discarding non UTF-8 input line: {}", e);
                return Ok(Some(Incoming::Malformed(e.to_string())));
            }
        };
        let line = line.trim();
        if line.is_empty() {
            return Ok(Some(Incoming::Empty));
        }

        match serde_json::from_str(line) {
            Ok(request) => Ok(Some(Incoming::Request(request))),
            Err(e) => {
                tracing::error!("Failed to parse JSON-RPC request: {}", e);
                Ok(Some(Incoming::Malformed(e.to_string())))
            }
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}
