//! Newline-delimited text framing shared by the authority and the client.
//!
//! Client to authority: one frame per query (a transaction hash), or the
//! literal `close` to end the session.
//!
//! Authority to client, per query: zero or more sibling-hash frames, then
//! exactly one `endOfAuthNodes` frame. Nothing is sent in reply to `close`.

use merkle_proof::{Hash, SiblingPath};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{NodeError, Result};

/// Sent by the client to end its session
pub const CLOSE_SENTINEL: &str = "close";

/// Sent by the authority after the last sibling of a path
pub const END_OF_PATH: &str = "endOfAuthNodes";

/// Longest frame accepted, excluding the newline
pub const MAX_FRAME_LEN: usize = 4096;

/// Frame received by the authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Close,
    Query(Hash),
    /// Text that is neither `close` nor a hash
    Malformed(String),
}

impl ClientFrame {
    pub fn parse(raw: &str) -> Self {
        if raw == CLOSE_SENTINEL {
            return ClientFrame::Close;
        }
        match Hash::parse(raw) {
            Ok(hash) => ClientFrame::Query(hash),
            Err(_) => ClientFrame::Malformed(raw.to_string()),
        }
    }
}

/// Frame received by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Sibling(Hash),
    EndOfPath,
}

impl ServerFrame {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == END_OF_PATH {
            return Ok(ServerFrame::EndOfPath);
        }
        Hash::parse(raw)
            .map(ServerFrame::Sibling)
            .map_err(|_| NodeError::ProtocolViolation(format!("expected sibling hash, got {raw:?}")))
    }
}

/// Reads trimmed text frames
pub struct MessageReader<R> {
    inner: R,
    buf: Vec<u8>,
    lossy: bool,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(128),
            lossy: false,
        }
    }

    /// Reader that replaces invalid UTF-8 instead of rejecting the frame
    ///
    /// Used by the authority, which answers undecodable queries with an
    /// empty path.
    pub fn lossy(inner: R) -> Self {
        Self {
            lossy: true,
            ..Self::new(inner)
        }
    }

    /// Next non-empty frame, or `None` once the peer has closed the stream
    ///
    /// Surrounding whitespace and NUL padding are stripped. The length cap
    /// applies after the `\n` or `\r\n` line ending is removed.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let n = (&mut self.inner)
                .take(MAX_FRAME_LEN as u64 + 2)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                return Ok(None);
            }

            let mut body = &self.buf[..];
            if let Some(rest) = body.strip_suffix(b"\n") {
                body = rest.strip_suffix(b"\r").unwrap_or(rest);
            }
            if body.len() > MAX_FRAME_LEN {
                return Err(NodeError::ProtocolViolation(format!(
                    "frame exceeds {MAX_FRAME_LEN} bytes"
                )));
            }

            let text = if self.lossy {
                String::from_utf8_lossy(body)
            } else {
                std::str::from_utf8(body)
                    .map_err(|e| NodeError::ProtocolViolation(format!("frame is not UTF-8: {e}")))?
                    .into()
            };
            let frame = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if !frame.is_empty() {
                return Ok(Some(frame.to_string()));
            }
        }
    }

    /// Collect sibling frames up to the terminator
    pub async fn read_path(&mut self) -> Result<SiblingPath> {
        let mut path = SiblingPath::new();
        loop {
            let Some(raw) = self.next_frame().await? else {
                return Err(NodeError::ProtocolViolation(format!(
                    "stream closed after {} siblings without {END_OF_PATH}",
                    path.len()
                )));
            };
            match ServerFrame::parse(&raw)? {
                ServerFrame::Sibling(hash) => path.push(hash),
                ServerFrame::EndOfPath => return Ok(path),
            }
        }
    }
}

/// Writes newline-terminated text frames
pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    async fn write_frame(&mut self, frame: &str) -> Result<()> {
        self.inner.write_all(frame.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn send_query(&mut self, transaction: &Hash) -> Result<()> {
        self.write_frame(transaction.as_str()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn send_close(&mut self) -> Result<()> {
        self.write_frame(CLOSE_SENTINEL).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Siblings in order, then the terminator
    pub async fn send_path(&mut self, path: &SiblingPath) -> Result<()> {
        for sibling in path {
            self.write_frame(sibling.as_str()).await?;
        }
        self.write_frame(END_OF_PATH).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
