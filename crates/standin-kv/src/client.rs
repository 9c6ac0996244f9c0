// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Read-only client for a local parameter store.
//!
//! The client broadcasts one empty datagram on the discovery port and keeps the snapshot carried
//! by the first reply. It never asks again: its view of the store is fixed at construction.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::constants::{DEFAULT_DISCOVERY_PORT, DISCOVERY_TIMEOUT, MAX_DATAGRAM_BYTES};
use crate::errors::KvError;
use crate::parameter::ParameterReader;
use crate::snapshot::{self, Snapshot};

#[derive(Debug, Clone)]
pub struct KvClientConfig {
    /// Where the discovery request is sent, the limited broadcast address by default
    pub broadcast_addr: IpAddr,
    pub port: u16,
    pub timeout: Duration,
}

impl Default for KvClientConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            port: DEFAULT_DISCOVERY_PORT,
            timeout: DISCOVERY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KvClient {
    snapshot: Snapshot,
    server: SocketAddr,
}

impl KvClient {
    /// Finds a local parameter store and fetches its snapshot.
    ///
    /// Fails with [`KvError::Timeout`] if nobody answers within the configured timeout, and with
    /// [`KvError::Connection`] if the socket cannot be set up.
    pub async fn discover(config: &KvClientConfig) -> Result<Self, KvError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(KvError::Connection)?;
        socket.set_broadcast(true).map_err(KvError::Connection)?;

        let target = SocketAddr::new(config.broadcast_addr, config.port);
        debug!("Sending discovery request to {}", target);
        socket
            .send_to(&[], target)
            .await
            .map_err(KvError::Connection)?;

        let deadline = Instant::now() + config.timeout;
        let mut buf = vec![0; MAX_DATAGRAM_BYTES];
        loop {
            match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => return Err(KvError::Timeout(config.timeout)),
                Ok(Ok((amt, server))) => {
                    let snapshot = snapshot::decode(&buf[..amt]);
                    info!(
                        "Discovered parameter store at {} with {} parameters",
                        server,
                        snapshot.len()
                    );
                    return Ok(Self { snapshot, server });
                }
                // Nobody listening on a unicast target shows up as an ICMP error; keep waiting
                // for the deadline like any other missing reply.
                Ok(Err(e)) if is_unreachable(&e) => {
                    debug!("Discovery request not delivered: {}", e);
                }
                Ok(Err(e)) => return Err(KvError::Connection(e)),
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<String, KvError> {
        self.snapshot
            .get(name)
            .cloned()
            .ok_or_else(|| KvError::NotFound(name.to_string()))
    }

    /// The snapshot received at discovery time.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Address of the store that answered.
    pub fn server(&self) -> SocketAddr {
        self.server
    }
}

fn is_unreachable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

#[async_trait]
impl ParameterReader for KvClient {
    async fn get_parameter(&self, name: &str) -> Result<String, KvError> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KvClientConfig::default();
        assert_eq!(config.port, 1026);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.broadcast_addr, IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255)));
    }

    #[test]
    fn test_get_from_snapshot() {
        let client = KvClient {
            snapshot: Snapshot::from([("test".to_string(), "testing123".to_string())]),
            server: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1026),
        };

        assert_eq!(client.get("test").unwrap(), "testing123");
        assert!(matches!(client.get("other"), Err(KvError::NotFound(_))));
    }
}
