//! Transport Module Tests
//!
//! ## Test Scopes
//! - **Addresses**: validation before any call is made.
//! - **Liveness**: the TCP probe against open and closed ports.
//! - **Calls**: a real router served on an ephemeral port, 404 mapping, the
//!   idle guard, and the whole-call timeout.

#[cfg(test)]
mod tests {
    use crate::chord::ChordNode;
    use crate::config::NodeConfig;
    use crate::error::ChordError;
    use crate::ring::RingId;
    use crate::rpc::{RpcClient, server, validate_address};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn test_config() -> NodeConfig {
        NodeConfig {
            maintain_period: Duration::from_millis(50),
            ..Default::default()
        }
    }

    fn closed_address() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        addr
    }

    /// Serves a fresh ring of one on an ephemeral port.
    async fn spawn_node() -> (Arc<ChordNode>, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let node = ChordNode::new(addr, test_config()).unwrap();
        node.create().await;
        node.set_listening(true);

        let (tx, rx) = oneshot::channel::<()>();
        let served = node.clone();
        tokio::spawn(async move {
            let _ = server::serve(listener, served, async {
                let _ = rx.await;
            })
            .await;
        });

        (node, tx)
    }

    // ============================================================
    // ADDRESS TESTS
    // ============================================================

    #[test]
    fn test_validate_address_accepts_host_port() {
        assert!(validate_address("127.0.0.1:14025").is_ok());
        assert!(validate_address("node-3.local:80").is_ok());
        assert!(validate_address("[::1]:9000").is_ok());
    }

    #[test]
    fn test_validate_address_rejects_malformed() {
        for bad in ["", "127.0.0.1", ":14025", "host:", "host:99999", "host:port"] {
            assert!(
                matches!(validate_address(bad), Err(ChordError::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_call_with_invalid_address_fails_fast() {
        let client = RpcClient::new(&test_config());

        let result = client.get_successors("").await;
        assert!(matches!(result, Err(ChordError::InvalidAddress(_))));
    }

    // ============================================================
    // LIVENESS TESTS
    // ============================================================

    #[tokio::test]
    async fn test_liveness_of_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let client = RpcClient::new(&test_config());

        assert!(client.check_liveness(&addr).await);
    }

    #[tokio::test]
    async fn test_liveness_of_closed_port() {
        let client = RpcClient::new(&test_config());
        assert!(!client.check_liveness(&closed_address()).await);
    }

    #[tokio::test]
    async fn test_liveness_of_invalid_address() {
        let client = RpcClient::new(&test_config());
        assert!(!client.check_liveness("nonsense").await);
    }

    // ============================================================
    // CALL TESTS
    // ============================================================

    #[tokio::test]
    async fn test_call_to_dead_peer_is_retryable() {
        let client = RpcClient::new(&test_config());

        let err = client
            .find_successor(&closed_address(), &RingId::hash("k"), 0)
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_call_to_silent_peer_times_out() {
        // accepted by the kernel backlog but never answered
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let client = RpcClient::new(&test_config());

        let result = client.get_predecessor(&addr).await;
        assert!(matches!(result, Err(ChordError::Timeout { .. })), "{result:?}");
    }

    #[tokio::test]
    async fn test_ring_calls_against_served_node() {
        let (node, _shutdown) = spawn_node().await;
        let client = RpcClient::new(&test_config());

        let successors = client.get_successors(node.address()).await.unwrap();
        assert_eq!(successors, vec![node.address().to_string()]);

        assert_eq!(client.get_predecessor(node.address()).await.unwrap(), None);

        let owner = client
            .find_successor(node.address(), &RingId::hash("k"), 0)
            .await
            .unwrap();
        assert_eq!(owner, node.address());
    }

    #[tokio::test]
    async fn test_storage_calls_against_served_node() {
        let (node, _shutdown) = spawn_node().await;
        let client = RpcClient::new(&test_config());
        let addr = node.address().to_string();

        client.put(&addr, "k", "v").await.unwrap();
        assert_eq!(client.get(&addr, "k").await.unwrap(), Some("v".to_string()));
        assert_eq!(client.get(&addr, "missing").await.unwrap(), None);

        assert_eq!(client.delete(&addr, "k").await.unwrap(), "v");
        assert!(matches!(
            client.delete(&addr, "k").await,
            Err(ChordError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_backup_calls_against_served_node() {
        let (node, _shutdown) = spawn_node().await;
        let client = RpcClient::new(&test_config());
        let addr = node.address().to_string();

        client.put_on_backup(&addr, "a", "1").await.unwrap();
        client.delete_on_backup(&addr, "a").await.unwrap();
        assert!(matches!(
            client.delete_on_backup(&addr, "a").await,
            Err(ChordError::NotFound(_))
        ));

        let entries = [("b".to_string(), "2".to_string()), ("c".to_string(), "3".to_string())]
            .into_iter()
            .collect();
        client.send_backup(&addr, &entries).await.unwrap();
        assert_eq!(node.snapshot().await.backup.len(), 2);

        client.remove_from_backup(&addr, &entries).await.unwrap();
        assert!(node.snapshot().await.backup.is_empty());
    }

    #[tokio::test]
    async fn test_failed_remote_lookup_is_routing_error() {
        let (node, _shutdown) = spawn_node().await;
        let client = RpcClient::new(&test_config());

        // no successors left to route through
        node.clear().await;

        let err = client
            .find_successor(node.address(), &RingId::hash("k"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ChordError::Routing(_)), "{err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_other_failures_stay_remote_errors() {
        let (node, _shutdown) = spawn_node().await;
        let client = RpcClient::new(&test_config());

        // an empty split candidate is rejected with 400
        let err = client
            .split_into_predecessor(node.address(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, ChordError::Remote { status: 400, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_idle_node_looks_dead() {
        let (node, _shutdown) = spawn_node().await;
        let client = RpcClient::new(&test_config());

        node.set_listening(false);

        let err = client.get_successors(node.address()).await.unwrap_err();
        assert!(matches!(err, ChordError::Transport { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_shutdown_closes_listener() {
        let (node, shutdown) = spawn_node().await;
        let client = RpcClient::new(&test_config());
        assert!(client.check_liveness(node.address()).await);

        shutdown.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!client.check_liveness(node.address()).await);
    }
}
