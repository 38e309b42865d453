//! Validity client: asks the authority for each transaction's sibling path
//! and classifies the transaction against a known root.
//!
//! Queries go out strictly one at a time over a single connection; query
//! `n + 1` is only sent once the path for query `n` has been fully read.

use std::future::{pending, Future};
use std::time::Duration;

use merkle_proof::{Hash, HashAlgorithm, ProofVerifier, SiblingPath};
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, PartialCheck, Result};
use crate::report::{ValidityReport, VerificationVerdict};
use crate::retry::{retry_with_exponential_backoff, RetryConfig};
use crate::wire::{MessageReader, MessageWriter};

/// Upper bound on the best-effort `close` sent after an aborted query
const ABORT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything one validity session needs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Root known ahead of time
    pub root: Hash,
    /// Transactions to check, in order
    pub queries: Vec<Hash>,
    pub hash_algorithm: HashAlgorithm,
    pub query_timeout: Option<Duration>,
    pub retry: RetryConfig,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, root: Hash, queries: Vec<Hash>) -> Self {
        Self {
            host: host.into(),
            port,
            root,
            queries,
            hash_algorithm: HashAlgorithm::default(),
            query_timeout: None,
            retry: RetryConfig::none(),
        }
    }

    pub fn from_node_config(node: &NodeConfig, root: Hash, queries: Vec<Hash>) -> Self {
        Self {
            host: node.host.clone(),
            port: node.port,
            root,
            queries,
            hash_algorithm: node.hash_algorithm,
            query_timeout: node.query_timeout(),
            retry: node.retry_config(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Open connection to an authority
pub struct AuthorityConnection {
    reader: MessageReader<BufReader<OwnedReadHalf>>,
    writer: MessageWriter<OwnedWriteHalf>,
}

impl AuthorityConnection {
    pub fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: MessageReader::new(BufReader::new(read)),
            writer: MessageWriter::new(write),
        }
    }

    /// Send one query and drain its sibling path
    pub async fn query(&mut self, transaction: &Hash) -> Result<SiblingPath> {
        self.writer.send_query(transaction).await?;
        self.reader.read_path().await
    }

    /// Send `close` and shut down the write half
    pub async fn close(mut self) -> Result<()> {
        self.writer.send_close().await?;
        self.writer.shutdown().await
    }
}

pub struct ValidityClient {
    config: ClientConfig,
    cancel: Option<broadcast::Receiver<()>>,
}

impl ValidityClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Abort the session when a message arrives on `cancel`
    pub fn with_cancellation(mut self, cancel: broadcast::Receiver<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check every configured transaction against the root
    ///
    /// On failure the verdicts gathered so far come back inside
    /// [`PartialCheck`].
    pub async fn check_all(&mut self) -> std::result::Result<ValidityReport, PartialCheck> {
        let verifier = ProofVerifier::new(self.config.hash_algorithm);
        let root = self.config.root.clone();
        let queries = self.config.queries.clone();
        let timeout = self.config.query_timeout;
        let mut report = ValidityReport::new(root.clone(), self.config.hash_algorithm);

        let connected = tokio::select! {
            connected = connect(&self.config) => connected,
            _ = cancellation(self.cancel.as_mut()) => Err(NodeError::Cancelled),
        };
        let mut conn = match connected {
            Ok(conn) => conn,
            Err(source) => return Err(partial(report, queries.len(), source)),
        };

        for transaction in &queries {
            let exchange = async {
                match timeout {
                    Some(limit) => match tokio::time::timeout(limit, conn.query(transaction)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(NodeError::Timeout {
                            transaction: transaction.to_string(),
                            timeout_ms: limit.as_millis() as u64,
                        }),
                    },
                    None => conn.query(transaction).await,
                }
            };

            let outcome = tokio::select! {
                outcome = exchange => outcome,
                _ = cancellation(self.cancel.as_mut()) => Err(NodeError::Cancelled),
            };

            match outcome {
                Ok(path) => {
                    let valid = verifier.verify(&root, transaction, &path);
                    debug!(transaction = %transaction, siblings = path.len(), valid, "Transaction checked");
                    report.record(VerificationVerdict {
                        transaction: transaction.clone(),
                        valid,
                        path_len: path.len(),
                    });
                }
                Err(source) => {
                    warn!(transaction = %transaction, error = %source, "Aborting validity session");
                    if matches!(source, NodeError::Timeout { .. } | NodeError::Cancelled) {
                        let limit = timeout.map_or(ABORT_CLOSE_TIMEOUT, |t| t.min(ABORT_CLOSE_TIMEOUT));
                        close_after_abort(conn.close(), limit).await;
                    }
                    return Err(partial(report, queries.len(), source));
                }
            }
        }

        if let Err(source) = conn.close().await {
            return Err(partial(report, queries.len(), source));
        }

        info!(
            valid = report.valid_count(),
            invalid = report.invalid_count(),
            "Validity session complete"
        );
        Ok(report)
    }
}

async fn connect(config: &ClientConfig) -> Result<AuthorityConnection> {
    let addr = config.address();
    let addr = addr.as_str();
    info!(authority = addr, "Connecting to authority");

    let stream = retry_with_exponential_backoff("connect", &config.retry, move || async move {
        TcpStream::connect(addr).await.map_err(NodeError::from)
    })
    .await?;

    Ok(AuthorityConnection::new(stream))
}

/// Check `queries` against `root` using `config` for everything else
pub async fn check_all(
    node: &NodeConfig,
    root: Hash,
    queries: Vec<Hash>,
) -> std::result::Result<ValidityReport, PartialCheck> {
    ValidityClient::new(ClientConfig::from_node_config(node, root, queries))
        .check_all()
        .await
}

/// Send `close` on a best-effort basis, giving up after `limit`
///
/// A peer that has stopped reading must not stall the abort.
async fn close_after_abort<F>(close: F, limit: Duration)
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(limit, close).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Close after abort failed"),
        Err(_) => debug!(limit_ms = limit.as_millis() as u64, "Close after abort timed out"),
    }
}

fn partial(report: ValidityReport, requested: usize, source: NodeError) -> PartialCheck {
    PartialCheck {
        partial: report,
        requested,
        source,
    }
}

/// Resolves once cancellation is requested; never if there is no signal
async fn cancellation(cancel: Option<&mut broadcast::Receiver<()>>) {
    match cancel {
        Some(rx) => match rx.recv().await {
            Err(RecvError::Closed) => pending::<()>().await,
            Ok(()) | Err(RecvError::Lagged(_)) => {}
        },
        None => pending::<()>().await,
    }
}
