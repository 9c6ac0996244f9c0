// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Discovery responder.
//!
//! Listens on a UDP port and answers every datagram, whatever its payload, with the full current
//! snapshot in a single datagram. Clients broadcast an empty request and take the first reply.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::errors::KvError;
use crate::snapshot::SnapshotFile;

// Requests carry no payload; anything longer is truncated and ignored.
const REQUEST_BUFFER_SIZE: usize = 512;

pub struct DiscoveryResponder {
    socket: UdpSocket,
    snapshot: Arc<SnapshotFile>,
    cancel_token: CancellationToken,
}

impl DiscoveryResponder {
    /// Binds the responder socket on `host:port`.
    pub async fn bind(
        host: &str,
        port: u16,
        snapshot: Arc<SnapshotFile>,
        cancel_token: CancellationToken,
    ) -> Result<Self, KvError> {
        let addr = format!("{host}:{port}");
        let socket = UdpSocket::bind(&addr).await.map_err(|e| {
            error!("Could not bind discovery responder to {}: {}", addr, e);
            KvError::Connection(e)
        })?;
        Ok(Self {
            socket,
            snapshot,
            cancel_token,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, KvError> {
        self.socket.local_addr().map_err(KvError::Connection)
    }

    /// Answers discovery requests until the cancel token fires.
    pub async fn spin(self) {
        match self.socket.local_addr() {
            Ok(addr) => info!("Discovery responder listening on {}", addr),
            Err(_) => info!("Discovery responder listening"),
        }

        let mut buf = [0; REQUEST_BUFFER_SIZE];
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((_, src)) => self.reply(src).await,
                    // ICMP errors from earlier replies surface here on some platforms
                    Err(e) => warn!("Discovery receive failed: {}", e),
                },
            }
        }

        debug!("Discovery responder stopped");
    }

    async fn reply(&self, src: SocketAddr) {
        // File read under the snapshot lock, kept off the async workers.
        let snapshot = Arc::clone(&self.snapshot);
        let payload = match tokio::task::spawn_blocking(move || snapshot.serialized()).await {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to read snapshot for discovery reply: {}", e);
                return;
            }
        };
        trace!("Discovery request from {}, replying with {} bytes", src, payload.len());
        if let Err(e) = self.socket.send_to(&payload, src).await {
            error!("Failed to send discovery reply to {}: {}", src, e);
        }
    }
}
