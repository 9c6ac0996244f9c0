// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Local parameter store service.
//!
//! Owns the snapshot file and, unless disabled, a [`DiscoveryResponder`] task that serves the
//! snapshot to clients on the same network segment. There is no in-memory cache: every read,
//! write and discovery reply goes back to the file, so edits made to it from outside are picked
//! up without a restart.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants::{DEFAULT_DISCOVERY_PORT, DEFAULT_STORAGE_PATH};
use crate::discovery::DiscoveryResponder;
use crate::errors::KvError;
use crate::parameter::{Parameter, ParameterReader, ParameterStore};
use crate::snapshot::{Snapshot, SnapshotFile};

/// Configuration for the local parameter store service
#[derive(Debug, Clone)]
pub struct KvServiceConfig {
    /// Snapshot file; its parent directory is created if missing
    pub storage_path: PathBuf,
    /// Host to bind the discovery socket to (e.g., "0.0.0.0")
    pub host: String,
    /// Discovery port, 0 picks an ephemeral port
    pub port: u16,
    /// Whether to answer discovery requests at all
    pub serve_discovery: bool,
}

impl Default for KvServiceConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_DISCOVERY_PORT,
            serve_discovery: true,
        }
    }
}

pub struct KvService {
    snapshot: Arc<SnapshotFile>,
    cancel_token: CancellationToken,
    responder: Option<JoinHandle<()>>,
    discovery_addr: Option<SocketAddr>,
}

impl KvService {
    /// Opens the store and starts the discovery responder.
    pub async fn start(config: &KvServiceConfig) -> Result<Self, KvError> {
        if let Some(parent) = config.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let snapshot = Arc::new(SnapshotFile::new(config.storage_path.clone()));
        let cancel_token = CancellationToken::new();

        let (responder, discovery_addr) = if config.serve_discovery {
            let responder = DiscoveryResponder::bind(
                &config.host,
                config.port,
                Arc::clone(&snapshot),
                cancel_token.clone(),
            )
            .await?;
            let addr = responder.local_addr()?;
            (Some(tokio::spawn(responder.spin())), Some(addr))
        } else {
            debug!("Discovery disabled, serving parameters locally only");
            (None, None)
        };

        info!(
            "Local parameter store opened at {}",
            config.storage_path.display()
        );

        Ok(Self {
            snapshot,
            cancel_token,
            responder,
            discovery_addr,
        })
    }

    /// Stores `value` under `name`.
    pub fn put(&self, name: &str, value: &str, overwrite: bool) -> Result<(), KvError> {
        self.snapshot.update(|snapshot| {
            if !overwrite && snapshot.contains_key(name) {
                return Err(KvError::AlreadyExists(name.to_string()));
            }
            snapshot.insert(name.to_string(), value.to_string());
            Ok(())
        })
    }

    pub fn get(&self, name: &str) -> Result<String, KvError> {
        self.snapshot
            .load()
            .remove(name)
            .ok_or_else(|| KvError::NotFound(name.to_string()))
    }

    /// The whole store as it is on disk right now.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.load()
    }

    /// Address the discovery responder is bound to, if it is running.
    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery_addr
    }

    /// Stops the discovery responder. The snapshot file is left as it is.
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(responder) = self.responder.take() {
            let _ = responder.await;
        }
        self.discovery_addr = None;
    }
}

impl Drop for KvService {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[async_trait]
impl ParameterReader for KvService {
    async fn get_parameter(&self, name: &str) -> Result<String, KvError> {
        self.get(name)
    }
}

#[async_trait]
impl ParameterStore for KvService {
    async fn put_parameter(&self, parameter: Parameter, overwrite: bool) -> Result<(), KvError> {
        self.put(&parameter.name, &parameter.value, overwrite)
    }
}
