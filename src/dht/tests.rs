//! Ring Integration Tests
//!
//! Every test runs real nodes on ephemeral loopback ports with a short
//! maintenance period, and polls for convergence instead of sleeping a fixed
//! amount.
//!
//! ## Test Scopes
//! - **Lifecycle**: run/quit/force_quit, the listening precondition, join failures.
//! - **Data Path**: CRUD on one node, the 3-node/5-key scenario, delete idempotence.
//! - **Ring Properties**: closure of the successor cycle, unique key ownership,
//!   replication to the successor's backup.
//! - **Failures**: promotion of the backup after a crash, successor list repair.
//! - **Backup Artifact**: dump and restore.

#[cfg(test)]
mod tests {
    use crate::config::NodeConfig;
    use crate::dht::DhtNode;
    use crate::error::ChordError;
    use std::collections::{HashMap, HashSet};
    use std::future::Future;
    use std::io::Cursor;
    use std::time::Duration;

    const PERIOD: Duration = Duration::from_millis(100);

    fn fast_config() -> NodeConfig {
        NodeConfig {
            maintain_period: PERIOD,
            retry_delay: Duration::from_millis(100),
            join_retry_delay: Duration::from_millis(200),
            ..Default::default()
        }
    }

    async fn start_node() -> DhtNode {
        let mut node = DhtNode::new("127.0.0.1:0", fast_config()).unwrap();
        node.run().await.unwrap();
        node
    }

    /// Starts `size` nodes, each joining through the first one.
    async fn start_ring(size: usize) -> Vec<DhtNode> {
        let first = start_node().await;
        let bootstrap = first.address().to_string();
        let mut nodes = vec![first];

        for _ in 1..size {
            let node = start_node().await;
            node.join(&bootstrap).await.unwrap();
            nodes.push(node);
        }
        nodes
    }

    /// Polls `check` until it holds or `limit` maintenance periods pass.
    async fn eventually<F, Fut>(limit: u32, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + PERIOD * limit;
        loop {
            if check().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(PERIOD / 2).await;
        }
    }

    /// Following successor[0] from any node visits every node once and comes
    /// back, and every successor points back through its predecessor.
    async fn ring_is_closed(nodes: &[&DhtNode]) -> bool {
        let mut next: HashMap<String, Option<String>> = HashMap::new();
        let mut prev: HashMap<String, Option<String>> = HashMap::new();
        for node in nodes {
            let snapshot = node.snapshot().await;
            next.insert(snapshot.address.clone(), snapshot.successors.first().cloned());
            prev.insert(snapshot.address, snapshot.predecessor);
        }

        for node in nodes {
            let start = node.address().to_string();
            let mut current = start.clone();
            let mut seen = HashSet::new();
            for _ in 0..nodes.len() {
                seen.insert(current.clone());
                match next.get(&current).cloned().flatten() {
                    Some(successor) => current = successor,
                    None => return false,
                }
            }
            if current != start || seen.len() != nodes.len() {
                return false;
            }
        }

        next.iter().all(|(addr, successor)| {
            successor
                .as_ref()
                .and_then(|s| prev.get(s).cloned().flatten())
                .as_deref()
                == Some(addr.as_str())
        })
    }

    /// Exactly one node claims `key` and that node holds `value`.
    async fn owned_once(nodes: &[&DhtNode], key: &str, value: &str) -> bool {
        let mut owners = Vec::new();
        for node in nodes {
            let snapshot = node.snapshot().await;
            if snapshot.owns(key) {
                owners.push(snapshot);
            }
        }
        owners.len() == 1 && owners[0].data.get(key).map(String::as_str) == Some(value)
    }

    // ============================================================
    // LIFECYCLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_operations_require_listening() {
        let node = DhtNode::new("127.0.0.1:0", fast_config()).unwrap();

        assert!(matches!(node.put("k", "v").await, Err(ChordError::NotListening(_))));
        assert!(matches!(node.get("k").await, Err(ChordError::NotListening(_))));
        assert!(matches!(node.delete("k").await, Err(ChordError::NotListening(_))));
        assert!(matches!(
            node.join("127.0.0.1:1").await,
            Err(ChordError::NotListening(_))
        ));
    }

    #[tokio::test]
    async fn test_run_binds_ephemeral_port() {
        let node = start_node().await;

        assert!(node.is_listening());
        assert!(!node.address().ends_with(":0"));
        assert!(node.ping(node.address()).await);
    }

    #[tokio::test]
    async fn test_set_identity_while_stopped() {
        let mut node = DhtNode::new("127.0.0.1:0", fast_config()).unwrap();

        node.set_identity("15000").unwrap();
        assert_eq!(node.address(), "127.0.0.1:15000");
        assert!(matches!(
            node.set_identity("bogus"),
            Err(ChordError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_set_identity_while_running_is_refused() {
        let mut node = start_node().await;
        let address = node.address().to_string();

        let result = node.set_identity("15000");
        assert!(matches!(result, Err(ChordError::AlreadyRunning(_))), "{result:?}");
        assert_eq!(node.address(), address);
        assert!(node.is_listening());

        node.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_quit_clears_state_and_stops_serving() {
        let mut node = start_node().await;
        let observer = start_node().await;
        node.put("k", "v").await.unwrap();
        let address = node.address().to_string();

        node.quit().await.unwrap();

        assert!(!node.is_listening());
        let snapshot = node.snapshot().await;
        assert!(snapshot.data.is_empty());
        assert!(snapshot.successors.is_empty());
        assert!(!observer.ping(&address).await);
        assert!(matches!(node.put("k", "v").await, Err(ChordError::NotListening(_))));
        assert!(matches!(node.quit().await, Err(ChordError::NotListening(_))));
    }

    #[tokio::test]
    async fn test_force_quit_keeps_state_but_looks_dead() {
        let mut node = start_node().await;
        let observer = start_node().await;
        node.put("k", "v").await.unwrap();
        let address = node.address().to_string();

        node.force_quit().await;

        assert!(!observer.ping(&address).await);
        assert_eq!(
            node.snapshot().await.data.get("k").map(String::as_str),
            Some("v")
        );
    }

    #[tokio::test]
    async fn test_join_unreachable_bootstrap_fails() {
        let node = start_node().await;
        let dead = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let result = node.join(&dead).await;

        assert!(matches!(result, Err(ChordError::JoinFailure { .. })), "{result:?}");
        let successors = node.snapshot().await.successors;
        assert!(!successors.is_empty());
        assert!(successors.iter().all(|s| s == node.address()), "still a ring of one");
    }

    #[tokio::test]
    async fn test_join_invalid_address_is_not_retried() {
        let node = start_node().await;
        assert!(matches!(
            node.join("nowhere").await,
            Err(ChordError::InvalidAddress(_))
        ));
    }

    // ============================================================
    // DATA PATH TESTS
    // ============================================================

    #[tokio::test]
    async fn test_single_node_crud() {
        let node = start_node().await;

        node.put("language", "rust").await.unwrap();
        assert_eq!(node.get("language").await.unwrap(), Some("rust".to_string()));

        node.put("language", "still rust").await.unwrap();
        assert_eq!(
            node.get("language").await.unwrap(),
            Some("still rust".to_string())
        );

        assert!(node.delete("language").await.unwrap());
        assert_eq!(node.get("language").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_three_nodes_five_keys() {
        let nodes = start_ring(3).await;
        let refs: Vec<&DhtNode> = nodes.iter().collect();
        assert!(eventually(60, || ring_is_closed(&refs)).await);

        for i in 0..5usize {
            let value = (i * i).to_string();
            nodes[i % 3].put(&i.to_string(), &value).await.unwrap();
        }

        let mut mistakes = 0;
        let mut failures = 0;
        for node in &nodes {
            for i in 0..5usize {
                match node.get(&i.to_string()).await {
                    Ok(Some(value)) if value == (i * i).to_string() => {}
                    Ok(_) => mistakes += 1,
                    Err(_) => failures += 1,
                }
            }
        }

        assert_eq!(mistakes, 0);
        assert_eq!(failures, 0);
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let nodes = start_ring(3).await;
        let refs: Vec<&DhtNode> = nodes.iter().collect();
        assert!(eventually(60, || ring_is_closed(&refs)).await);

        nodes[0].put("ephemeral", "1").await.unwrap();
        assert!(nodes[1].delete("ephemeral").await.unwrap());
        assert!(!nodes[2].delete("ephemeral").await.unwrap());
        assert_eq!(nodes[0].get("ephemeral").await.unwrap(), None);
    }

    // ============================================================
    // RING PROPERTY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_ring_closes_after_joins() {
        let nodes = start_ring(4).await;
        let refs: Vec<&DhtNode> = nodes.iter().collect();

        assert!(eventually(60, || ring_is_closed(&refs)).await);
    }

    #[tokio::test]
    async fn test_sequential_joins_keep_keys_owned() {
        let first = start_node().await;
        let bootstrap = first.address().to_string();
        for i in 0..20 {
            first.put(&format!("key_{i}"), &i.to_string()).await.unwrap();
        }

        let mut nodes = vec![first];
        for _ in 0..4 {
            let node = start_node().await;
            node.join(&bootstrap).await.unwrap();
            nodes.push(node);

            let refs: Vec<&DhtNode> = nodes.iter().collect();
            assert!(eventually(60, || ring_is_closed(&refs)).await);
        }
        let refs: Vec<&DhtNode> = nodes.iter().collect();
        for i in 0..20 {
            let (key, value) = (format!("key_{i}"), i.to_string());
            assert!(
                owned_once(&refs, &key, &value).await,
                "{key} is not held by exactly its owner"
            );
            assert_eq!(nodes[4].get(&key).await.unwrap(), Some(value));
        }
    }

    #[tokio::test]
    async fn test_put_is_mirrored_on_successor() {
        let nodes = start_ring(3).await;
        let refs: Vec<&DhtNode> = nodes.iter().collect();
        assert!(eventually(60, || ring_is_closed(&refs)).await);

        for i in 0..10 {
            nodes[i % 3].put(&format!("mirrored_{i}"), "v").await.unwrap();
        }

        let mirrored = eventually(10, || async {
            let mut snapshots = HashMap::new();
            for node in &nodes {
                let snapshot = node.snapshot().await;
                snapshots.insert(snapshot.address.clone(), snapshot);
            }
            snapshots.values().all(|snapshot| {
                let Some(successor) = snapshot.successors.first() else {
                    return false;
                };
                let Some(next) = snapshots.get(successor) else {
                    return false;
                };
                snapshot
                    .data
                    .keys()
                    .all(|key| next.backup.contains_key(key))
            })
        })
        .await;
        assert!(mirrored, "every primary key should be in the successor's backup");
    }

    // ============================================================
    // FAILURE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_failover_after_force_quit() {
        let mut nodes = start_ring(3).await;
        {
            let refs: Vec<&DhtNode> = nodes.iter().collect();
            assert!(eventually(60, || ring_is_closed(&refs)).await);
        }

        for i in 0..30 {
            nodes[0].put(&format!("fo_{i}"), &i.to_string()).await.unwrap();
        }

        let mut victim = nodes.remove(1);
        let victim_snapshot = victim.snapshot().await;
        let victim_address = victim_snapshot.address.clone();
        let lost: Vec<(String, String)> = victim_snapshot.data.into_iter().collect();
        let successor_address = victim_snapshot.successors[0].clone();
        let successor = nodes
            .iter()
            .find(|n| n.address() == successor_address)
            .unwrap();

        // wait until the victim's keys are replicated before crashing it
        let replicated = eventually(20, || async {
            let backup = successor.snapshot().await.backup;
            lost.iter().all(|(k, _)| backup.contains_key(k))
        })
        .await;
        assert!(replicated);

        victim.force_quit().await;

        let survivors: Vec<&DhtNode> = nodes.iter().collect();
        assert!(
            eventually(60, || async {
                for node in &survivors {
                    if node.snapshot().await.successors.contains(&victim_address) {
                        return false;
                    }
                }
                true
            })
            .await,
            "successor lists still route through the crashed node"
        );
        assert!(eventually(60, || ring_is_closed(&survivors)).await);

        for (key, value) in &lost {
            for node in &survivors {
                assert_eq!(node.get(key).await.unwrap().as_ref(), Some(value));
            }
        }
    }

    #[tokio::test]
    async fn test_ping_reports_crash() {
        let mut nodes = start_ring(2).await;
        let address = nodes[1].address().to_string();
        assert!(nodes[0].ping(&address).await);

        nodes[1].force_quit().await;

        assert!(!nodes[0].ping(&address).await);
    }

    // ============================================================
    // BACKUP ARTIFACT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_dump_and_restore() {
        let nodes = start_ring(2).await;
        let refs: Vec<&DhtNode> = nodes.iter().collect();
        assert!(eventually(60, || ring_is_closed(&refs)).await);
        for i in 0..12 {
            nodes[0].put(&format!("d_{i}"), &format!("value {i}")).await.unwrap();
        }

        let mut artifact = Vec::new();
        let mut written = 0;
        for node in &nodes {
            written += node.dump(&mut artifact).await.unwrap();
        }
        assert_eq!(written, 12);

        let fresh = start_node().await;
        let applied = fresh.restore(Cursor::new(artifact)).await.unwrap();

        assert_eq!(applied, 12);
        for i in 0..12 {
            assert_eq!(
                fresh.get(&format!("d_{i}")).await.unwrap(),
                Some(format!("value {i}"))
            );
        }
    }

    #[tokio::test]
    async fn test_restore_stops_at_malformed_line() {
        let node = start_node().await;

        let result = node.restore(Cursor::new("a 1\nbroken\nc 3\n")).await;

        assert!(matches!(
            result,
            Err(ChordError::MalformedRecord { line: 2, .. })
        ));
        assert_eq!(node.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(node.snapshot().await.data.get("c"), None);
    }
}
