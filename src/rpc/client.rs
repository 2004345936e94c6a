//! Outbound calls to peers.
//!
//! Every call dials a fresh connection (no idle pool), retries a failed dial
//! once after a jittered backoff, and is raced as a whole against
//! `NodeConfig::call_timeout`. Expiry surfaces as `ChordError::Timeout`, a
//! failed remote lookup as `ChordError::Routing`, any other non-success status
//! as `ChordError::Remote`.

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::chord::protocol::*;
use crate::config::NodeConfig;
use crate::error::{ChordError, Result};
use crate::ring::RingId;
use crate::storage::memory::Entries;
use crate::storage::protocol::*;

const DIAL_ATTEMPTS: usize = 2;
const PROBE_ATTEMPTS: usize = 2;

/// Rejects empty or obviously malformed `host:port` addresses.
pub fn validate_address(addr: &str) -> Result<()> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(ChordError::InvalidAddress(addr.to_string())),
    }
}

fn endpoint_url(addr: &str, endpoint: &str) -> Result<String> {
    validate_address(addr)?;
    Ok(format!("http://{}{}", addr, endpoint))
}

#[derive(Clone)]
pub struct RpcClient {
    http_client: reqwest::Client,
    config: NodeConfig,
}

impl RpcClient {
    pub fn new(config: &NodeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.probe_timeout())
            .pool_max_idle_per_host(0)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            http_client,
            config: config.clone(),
        }
    }

    /// Best-effort liveness probe: a bare TCP connect, at most
    /// `PROBE_ATTEMPTS` times, each bounded by the probe timeout.
    pub async fn check_liveness(&self, addr: &str) -> bool {
        if validate_address(addr).is_err() {
            return false;
        }

        for attempt in 0..PROBE_ATTEMPTS {
            match tokio::time::timeout(self.config.probe_timeout(), TcpStream::connect(addr)).await
            {
                Ok(Ok(_)) => return true,
                Ok(Err(e)) => tracing::debug!("Probe of {} failed: {}", addr, e),
                Err(_) => tracing::debug!("Probe of {} timed out", addr),
            }

            if attempt + 1 < PROBE_ATTEMPTS {
                tokio::time::sleep(self.config.probe_spacing()).await;
            }
        }

        tracing::warn!("Connection trial to {} failed", addr);
        false
    }

    // --- Ring calls ---

    pub async fn find_successor(&self, addr: &str, id: &RingId, hops: usize) -> Result<String> {
        let payload = FindSuccessorRequest { id: *id, hops };
        let reply: AddressResponse = self
            .call_required(addr, ENDPOINT_FIND_SUCCESSOR, &payload)
            .await?;

        reply
            .address
            .ok_or_else(|| ChordError::Routing(format!("{} could not resolve {}", addr, id)))
    }

    pub async fn get_successors(&self, addr: &str) -> Result<Vec<String>> {
        let reply: SuccessorListResponse = self
            .call_required(addr, ENDPOINT_GET_SUCCESSORS, &())
            .await?;
        Ok(reply.successors)
    }

    pub async fn get_predecessor(&self, addr: &str) -> Result<Option<String>> {
        let reply: PredecessorResponse = self
            .call_required(addr, ENDPOINT_GET_PREDECESSOR, &())
            .await?;
        Ok(reply.predecessor)
    }

    pub async fn notify(&self, addr: &str, candidate: &str) -> Result<()> {
        let payload = NotifyRequest {
            candidate: candidate.to_string(),
        };
        self.call_ack(addr, ENDPOINT_NOTIFY, &payload).await
    }

    pub async fn split_into_predecessor(&self, addr: &str, new_node: &str) -> Result<Entries> {
        let payload = SplitRequest {
            address: new_node.to_string(),
        };
        let reply: DataResponse = self.call_required(addr, ENDPOINT_SPLIT, &payload).await?;
        Ok(reply.entries)
    }

    pub async fn receive_data(&self, addr: &str) -> Result<Entries> {
        let reply: DataResponse = self
            .call_required(addr, ENDPOINT_RECEIVE_DATA, &())
            .await?;
        Ok(reply.entries)
    }

    // --- Storage calls ---

    pub async fn put(&self, addr: &str, key: &str, value: &str) -> Result<()> {
        let payload = KeyValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.call_ack(addr, ENDPOINT_PUT, &payload).await
    }

    pub async fn get(&self, addr: &str, key: &str) -> Result<Option<String>> {
        let payload = KeyRequest {
            key: key.to_string(),
        };
        let reply: Option<GetResponse> = self.call(addr, ENDPOINT_GET, &payload).await?;
        Ok(reply.and_then(|r| r.value))
    }

    /// Returns the removed value; `ChordError::NotFound` if the key was absent.
    pub async fn delete(&self, addr: &str, key: &str) -> Result<String> {
        let payload = KeyRequest {
            key: key.to_string(),
        };
        let reply: Option<DeleteResponse> = self.call(addr, ENDPOINT_DELETE, &payload).await?;
        reply
            .and_then(|r| r.value)
            .ok_or_else(|| ChordError::NotFound(key.to_string()))
    }

    pub async fn put_on_backup(&self, addr: &str, key: &str, value: &str) -> Result<()> {
        let payload = KeyValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.call_ack(addr, ENDPOINT_PUT_ON_BACKUP, &payload).await
    }

    pub async fn delete_on_backup(&self, addr: &str, key: &str) -> Result<()> {
        let payload = KeyRequest {
            key: key.to_string(),
        };
        let reply: Option<AckResponse> = self
            .call(addr, ENDPOINT_DELETE_ON_BACKUP, &payload)
            .await?;
        match reply {
            Some(_) => Ok(()),
            None => Err(ChordError::NotFound(key.to_string())),
        }
    }

    pub async fn send_backup(&self, addr: &str, entries: &Entries) -> Result<()> {
        let payload = EntriesPayload {
            entries: entries.clone(),
        };
        self.call_ack(addr, ENDPOINT_SEND_BACKUP, &payload).await
    }

    pub async fn remove_from_backup(&self, addr: &str, entries: &Entries) -> Result<()> {
        let payload = EntriesPayload {
            entries: entries.clone(),
        };
        self.call_ack(addr, ENDPOINT_REMOVE_FROM_BACKUP, &payload)
            .await
    }

    // --- Call helpers ---

    async fn call_ack<T: Serialize>(&self, addr: &str, endpoint: &str, payload: &T) -> Result<()> {
        let reply: AckResponse = self.call_required(addr, endpoint, payload).await?;
        if reply.success {
            Ok(())
        } else {
            Err(ChordError::Remote {
                addr: addr.to_string(),
                endpoint: endpoint.to_string(),
                status: StatusCode::OK.as_u16(),
            })
        }
    }

    async fn call_required<T, R>(&self, addr: &str, endpoint: &str, payload: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        self.call(addr, endpoint, payload)
            .await?
            .ok_or_else(|| ChordError::Remote {
                addr: addr.to_string(),
                endpoint: endpoint.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
            })
    }

    /// Issues one call. `Ok(None)` means the peer answered `404`.
    async fn call<T, R>(&self, addr: &str, endpoint: &str, payload: &T) -> Result<Option<R>>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = endpoint_url(addr, endpoint)?;

        let exchange = async {
            let response = self.post_with_retry(addr, &url, payload).await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status == StatusCode::SERVICE_UNAVAILABLE {
                return Err(ChordError::Transport {
                    addr: addr.to_string(),
                    reason: "peer is not listening".to_string(),
                });
            }
            if status == StatusCode::BAD_GATEWAY && endpoint == ENDPOINT_FIND_SUCCESSOR {
                return Err(ChordError::Routing(format!(
                    "{} could not route the lookup",
                    addr
                )));
            }
            if !status.is_success() {
                return Err(ChordError::Remote {
                    addr: addr.to_string(),
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.json::<R>().await.map_err(|e| ChordError::Transport {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
            Ok(Some(body))
        };

        match tokio::time::timeout(self.config.call_timeout(), exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("Call {} on {} timed out", endpoint, addr);
                Err(ChordError::Timeout {
                    addr: addr.to_string(),
                })
            }
        }
    }

    /// Sends the request, redialing once if the connection could not be established.
    async fn post_with_retry<T: Serialize>(
        &self,
        addr: &str,
        url: &str,
        payload: &T,
    ) -> Result<reqwest::Response> {
        let mut delay = self.config.probe_spacing();

        for attempt in 0..DIAL_ATTEMPTS {
            let response = self.http_client.post(url).json(payload).send().await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_connect() && attempt + 1 < DIAL_ATTEMPTS => {
                    tracing::debug!("Dial {} failed, retrying: {}", addr, e);
                    let jitter = Duration::from_millis(rand::random::<u64>() % 50);
                    tokio::time::sleep(delay + jitter).await;
                    delay *= 2;
                }
                Err(e) => {
                    return Err(ChordError::Transport {
                        addr: addr.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(ChordError::Transport {
            addr: addr.to_string(),
            reason: "dial attempts exhausted".to_string(),
        })
    }
}
