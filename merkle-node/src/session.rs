//! Authority side of one client connection.
//!
//! Each connection is an explicit state machine:
//!
//! ```text
//! AwaitingMessage ──query──▶ SendingProof ──path written──▶ AwaitingMessage
//!        │
//!        └──close / EOF──▶ Closed
//! ```

use std::sync::Arc;

use merkle_proof::{Hash, ProofError, ProofSource, SiblingPath};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};
use crate::wire::{ClientFrame, MessageReader, MessageWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingMessage,
    SendingProof,
    Closed,
}

pub struct Session<R, W> {
    id: u64,
    state: SessionState,
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    source: Arc<dyn ProofSource>,
    answered: usize,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(id: u64, reader: R, writer: W, source: Arc<dyn ProofSource>) -> Self {
        Self {
            id,
            state: SessionState::AwaitingMessage,
            reader: MessageReader::lossy(reader),
            writer: MessageWriter::new(writer),
            source,
            answered: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Queries answered so far
    pub fn answered(&self) -> usize {
        self.answered
    }

    /// Drive the session until `close`, EOF or an I/O error
    ///
    /// Returns the number of queries answered.
    pub async fn run(mut self) -> Result<usize> {
        while self.state != SessionState::Closed {
            match self.reader.next_frame().await? {
                Some(raw) => self.handle_message(&raw).await?,
                None => {
                    debug!(session = self.id, "Peer hung up without close");
                    self.state = SessionState::Closed;
                }
            }
        }

        if let Err(e) = self.writer.shutdown().await {
            debug!(session = self.id, error = %e, "Shutdown after close failed");
        }
        Ok(self.answered)
    }

    /// React to one inbound frame
    ///
    /// `close` ends the session with no reply. Anything else is answered with
    /// a sibling path followed by the terminator; malformed and unknown
    /// transactions get an empty path.
    pub async fn handle_message(&mut self, raw: &str) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(NodeError::ProtocolViolation(format!(
                "frame {raw:?} after session close"
            )));
        }

        match ClientFrame::parse(raw) {
            ClientFrame::Close => {
                info!(session = self.id, answered = self.answered, "Close received");
                self.state = SessionState::Closed;
                return Ok(());
            }
            ClientFrame::Query(transaction) => {
                self.state = SessionState::SendingProof;
                let path = self.lookup(&transaction);
                debug!(
                    session = self.id,
                    transaction = %transaction,
                    siblings = path.len(),
                    "Sending proof path"
                );
                self.writer.send_path(&path).await?;
            }
            ClientFrame::Malformed(text) => {
                self.state = SessionState::SendingProof;
                warn!(session = self.id, frame = %text, "Malformed query, answering with empty path");
                self.writer.send_path(&SiblingPath::new()).await?;
            }
        }

        self.answered += 1;
        self.state = SessionState::AwaitingMessage;
        Ok(())
    }

    fn lookup(&self, transaction: &Hash) -> SiblingPath {
        match self.source.siblings_for(transaction) {
            Ok(path) => path,
            Err(ProofError::UnknownTransaction(_)) => {
                debug!(session = self.id, transaction = %transaction, "Unknown transaction");
                SiblingPath::new()
            }
            Err(e) => {
                warn!(session = self.id, transaction = %transaction, error = %e, "Proof lookup failed");
                SiblingPath::new()
            }
        }
    }
}
