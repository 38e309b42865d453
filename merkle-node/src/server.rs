//! Authority service: accepts connections and answers proof queries.
//!
//! Every accepted socket becomes its own task driving a [`Session`]. Run on a
//! `current_thread` runtime this is a single readiness loop in which a slow
//! client only ever parks its own task. The proof source is shared read-only.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use merkle_proof::ProofSource;
use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};
use crate::session::Session;

pub struct AuthorityService {
    source: Arc<dyn ProofSource>,
    max_sessions: Option<usize>,
}

impl AuthorityService {
    pub fn new(source: Arc<dyn ProofSource>) -> Self {
        Self {
            source,
            max_sessions: None,
        }
    }

    /// Cap concurrent sessions; further clients wait in the listen backlog
    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> Result<BoundAuthority> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Authority listening");
        Ok(BoundAuthority {
            service: self,
            listener,
        })
    }
}

/// Authority bound to a socket, ready to serve
pub struct BoundAuthority {
    service: AuthorityService,
    listener: TcpListener,
}

impl BoundAuthority {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve clients until `shutdown` resolves
    ///
    /// Accept failures and per-session errors are logged and never stop the
    /// loop.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let limiter = self.service.max_sessions.map(|n| Arc::new(Semaphore::new(n)));
        let mut next_id: u64 = 0;

        loop {
            let permit = match &limiter {
                Some(semaphore) => tokio::select! {
                    permit = semaphore.clone().acquire_owned() => Some(
                        permit.map_err(|e| NodeError::Other(anyhow::anyhow!("session limiter closed: {e}")))?,
                    ),
                    _ = &mut shutdown => break,
                },
                None => None,
            };

            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        next_id += 1;
                        self.spawn_session(next_id, stream, peer, permit);
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
                _ = &mut shutdown => break,
            }
        }

        info!(sessions = next_id, "Authority shutting down");
        Ok(())
    }

    fn spawn_session(
        &self,
        id: u64,
        stream: TcpStream,
        peer: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        info!(session = id, peer = %peer, "Connection accepted");
        let source = self.service.source.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(session = id, error = %e, "Could not set TCP_NODELAY");
            }

            let (read, write) = stream.into_split();
            let session = Session::new(id, BufReader::new(read), BufWriter::new(write), source);

            match session.run().await {
                Ok(answered) => info!(session = id, peer = %peer, answered, "Session closed"),
                Err(e) => warn!(session = id, peer = %peer, error = %e, "Session aborted"),
            }
        });
    }
}
