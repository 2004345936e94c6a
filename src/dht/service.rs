use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::backup;
use crate::chord::{ChordNode, NodeSnapshot};
use crate::config::NodeConfig;
use crate::error::{ChordError, Result};
use crate::rpc::{server, validate_address};

/// Host used when the identity is given as a bare port.
pub const DEFAULT_HOST: &str = "127.0.0.1";

struct ServerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    maintenance: Vec<JoinHandle<()>>,
}

/// The only surface external collaborators touch: lifecycle plus guarded
/// Put/Get/Delete with the client-side retry policy.
pub struct DhtNode {
    node: Arc<ChordNode>,
    config: NodeConfig,
    server: Option<ServerHandle>,
}

impl DhtNode {
    /// Creates a node identified by `address_or_port` (`"host:port"` or a bare port).
    pub fn new(address_or_port: &str, config: NodeConfig) -> Result<Self> {
        let address = resolve_identity(address_or_port)?;
        Ok(Self {
            node: ChordNode::new(address, config.clone())?,
            config,
            server: None,
        })
    }

    /// Replaces the node identity; only allowed while the node is not running.
    pub fn set_identity(&mut self, address_or_port: &str) -> Result<()> {
        if self.server.is_some() {
            return Err(ChordError::AlreadyRunning(self.node.address().to_string()));
        }
        let address = resolve_identity(address_or_port)?;
        self.node = ChordNode::new(address, self.config.clone())?;
        Ok(())
    }

    pub fn address(&self) -> &str {
        self.node.address()
    }

    pub fn is_listening(&self) -> bool {
        self.node.is_listening()
    }

    /// Shared handle to the underlying ring node (diagnostics, reporters).
    pub fn chord(&self) -> Arc<ChordNode> {
        self.node.clone()
    }

    /// Binds the listener, marks the node listening as a ring of one, and
    /// starts the maintenance loops.
    ///
    /// Binding port 0 picks an ephemeral port; the identity follows the bound
    /// address.
    pub async fn run(&mut self) -> Result<()> {
        if self.server.is_some() {
            tracing::warn!("{} is already running", self.node.address());
            return Ok(());
        }

        let listener = TcpListener::bind(self.node.address()).await.map_err(|e| {
            tracing::error!("Cannot run node at {}: {}", self.node.address(), e);
            e
        })?;

        if self.node.address().ends_with(":0") {
            let bound = listener.local_addr()?.to_string();
            self.node = ChordNode::new(bound, self.config.clone())?;
        }

        self.node.create().await;
        self.node.set_listening(true);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = {
            let node = self.node.clone();
            tokio::spawn(async move {
                let address = node.address().to_string();
                let shutdown = async {
                    let _ = shutdown_rx.await;
                };
                if let Err(e) = server::serve(listener, node, shutdown).await {
                    tracing::error!("Server at {} failed: {}", address, e);
                }
            })
        };
        let maintenance = self.node.start_maintenance();

        self.server = Some(ServerHandle {
            shutdown: Some(shutdown_tx),
            task,
            maintenance,
        });

        tracing::info!("Successfully run {}", self.node.address());
        Ok(())
    }

    /// Makes this node a ring of one.
    pub async fn create(&self) {
        self.node.create().await;
    }

    /// Joins the ring `bootstrap` belongs to, retrying once.
    ///
    /// On success waits a few maintenance periods so the ring has picked the
    /// node up before it serves lookups.
    pub async fn join(&self, bootstrap: &str) -> Result<()> {
        self.ensure_listening()?;
        validate_address(bootstrap)?;

        if let Err(first) = self.node.join(bootstrap).await {
            if let ChordError::InvalidAddress(_) = first {
                return Err(first);
            }
            tracing::warn!(
                "Join of {} via {} failed, retrying: {}",
                self.node.address(),
                bootstrap,
                first
            );
            tokio::time::sleep(self.config.join_retry_delay).await;

            if let Err(e) = self.node.join(bootstrap).await {
                tracing::error!("{} failed to join via {}: {}", self.node.address(), bootstrap, e);
                return Err(ChordError::JoinFailure {
                    bootstrap: bootstrap.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        tokio::time::sleep(self.config.join_settle()).await;
        tracing::info!("Successfully join {}", self.node.address());
        Ok(())
    }

    /// Graceful shutdown: stops listening and clears all local state.
    pub async fn quit(&mut self) -> Result<()> {
        self.ensure_listening()?;
        self.stop().await;
        self.node.clear().await;
        tracing::info!("Successfully quit {}", self.node.address());
        Ok(())
    }

    /// Abrupt shutdown without any hand-off; peers see a crash.
    pub async fn force_quit(&mut self) {
        self.stop().await;
        tracing::info!("Force quit {}", self.node.address());
    }

    pub async fn ping(&self, address: &str) -> bool {
        self.node.rpc().check_liveness(address).await
    }

    /// Stores `value` under `key` on its owner, retrying once on a routing or
    /// transport failure.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_listening()?;

        match self.node.put_on_chord(key, value).await {
            Err(e) if e.is_retryable() => {
                tracing::debug!("Put {} failed, retrying: {}", key, e);
                tokio::time::sleep(self.config.retry_delay).await;
                self.node.put_on_chord(key, value).await
            }
            other => other,
        }
    }

    /// Looks `key` up, retrying a bounded number of times since a lookup
    /// racing a topology change can transiently miss.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_listening()?;

        let attempts = self.config.get_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.node.get_on_chord(key).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => last_error = None,
                Err(e) if e.is_retryable() => {
                    tracing::debug!("Get {} attempt {} failed: {}", key, attempt + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!("Value of {} not found", key);
                Ok(None)
            }
        }
    }

    /// Deletes `key`; `Ok(false)` when it did not exist.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_listening()?;

        let result = match self.node.delete_on_chord(key).await {
            Err(e) if e.is_retryable() => {
                tracing::debug!("Delete {} failed, retrying: {}", key, e);
                tokio::time::sleep(self.config.retry_delay).await;
                self.node.delete_on_chord(key).await
            }
            other => other,
        };

        match result {
            Ok(_) => Ok(true),
            Err(ChordError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        self.node.snapshot().await
    }

    /// Writes the primary store to `sink` as backup records and logs the ring
    /// pointers. Returns the number of records written.
    pub async fn dump<W: Write>(&self, sink: &mut W) -> Result<usize> {
        self.ensure_listening()?;

        let snapshot = self.node.snapshot().await;
        tracing::info!(
            "{} (id {}): predecessor {:?}, successors {:?}, {} keys, {} backup keys",
            snapshot.address,
            snapshot.id,
            snapshot.predecessor,
            snapshot.successors,
            snapshot.data.len(),
            snapshot.backup.len()
        );

        backup::write_records(sink, &snapshot.data)
    }

    /// Replays a backup artifact as a sequence of puts, stopping at the first
    /// malformed line or failed put. Returns the number of records applied.
    pub async fn restore<R: BufRead>(&self, reader: R) -> Result<usize> {
        self.ensure_listening()?;

        let mut applied = 0;
        for record in backup::records(reader) {
            let (key, value) = record.inspect_err(|e| {
                tracing::error!("Restore stopped after {} records: {}", applied, e);
            })?;
            self.put(&key, &value).await?;
            applied += 1;
        }

        tracing::info!("Restored {} records into {}", applied, self.node.address());
        Ok(applied)
    }

    fn ensure_listening(&self) -> Result<()> {
        if self.node.is_listening() {
            Ok(())
        } else {
            tracing::warn!("{} not listening", self.node.address());
            Err(ChordError::NotListening(self.node.address().to_string()))
        }
    }

    async fn stop(&mut self) {
        self.node.set_listening(false);

        let Some(mut handle) = self.server.take() else {
            return;
        };

        for loop_handle in &handle.maintenance {
            loop_handle.abort();
        }
        if let Some(shutdown) = handle.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(self.config.call_timeout(), &mut handle.task)
            .await
            .is_err()
        {
            tracing::warn!("Server at {} did not drain in time", self.node.address());
            handle.task.abort();
        }
    }
}

fn resolve_identity(address_or_port: &str) -> Result<String> {
    let trimmed = address_or_port.trim();
    if let Ok(port) = trimmed.parse::<u16>() {
        return Ok(format!("{}:{}", DEFAULT_HOST, port));
    }
    validate_address(trimmed)?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_identity_from_port() {
        assert_eq!(resolve_identity("14025").unwrap(), "127.0.0.1:14025");
    }

    #[test]
    fn test_resolve_identity_keeps_address() {
        assert_eq!(
            resolve_identity("10.0.0.7:14025").unwrap(),
            "10.0.0.7:14025"
        );
    }

    #[test]
    fn test_resolve_identity_rejects_garbage() {
        assert!(matches!(
            resolve_identity("not-an-address"),
            Err(ChordError::InvalidAddress(_))
        ));
    }
}
