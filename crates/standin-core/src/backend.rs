// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The backend selector.
//!
//! The backend is chosen once, from the probe result, and every store, reader and log handler
//! built afterwards follows that choice. Application code only sees the parameter traits and the
//! [`LogHandler`], never which backend sits behind them.

use std::sync::Arc;

use async_trait::async_trait;
use standin_kv::client::KvClient;
use standin_kv::errors::KvError;
use standin_kv::parameter::{Parameter, ParameterReader, ParameterStore};
use standin_kv::service::KvService;
use standin_log::handler::LogHandler;
use standin_log::sink::LogSink;
use tracing::{debug, info, warn, Level};

use crate::config::StandinConfig;
use crate::error::ServicesError;
use crate::probe::{EnvironmentProbe, InstanceIdentity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Self-hosted stand-ins: local snapshot file and stdout logging
    Local,
    /// Hosted parameter store and log sink for this instance
    Remote(InstanceIdentity),
}

impl Backend {
    pub fn from_identity(identity: Option<InstanceIdentity>) -> Self {
        match identity {
            Some(identity) => Self::Remote(identity),
            None => Self::Local,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Builds clients for the hosted services.
///
/// Implementations resolve credentials for the instance's region and wrap the vendor clients in
/// the store and sink traits.
pub trait RemoteBackends: Send + Sync {
    fn parameter_store(
        &self,
        identity: &InstanceIdentity,
    ) -> Result<Arc<dyn ParameterStore>, ServicesError>;

    fn log_sink(&self, identity: &InstanceIdentity) -> Result<Arc<dyn LogSink>, ServicesError>;
}

/// A parameter store from whichever backend was selected.
pub enum ParameterStoreHandle {
    Local(KvService),
    Remote(Arc<dyn ParameterStore>),
}

impl ParameterStoreHandle {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Stops the local discovery responder; a no-op for remote stores.
    pub async fn stop(&mut self) {
        if let Self::Local(service) = self {
            service.stop().await;
        }
    }
}

#[async_trait]
impl ParameterReader for ParameterStoreHandle {
    async fn get_parameter(&self, name: &str) -> Result<String, KvError> {
        match self {
            Self::Local(service) => service.get(name),
            Self::Remote(store) => store.get_parameter(name).await,
        }
    }
}

#[async_trait]
impl ParameterStore for ParameterStoreHandle {
    async fn put_parameter(&self, parameter: Parameter, overwrite: bool) -> Result<(), KvError> {
        match self {
            Self::Local(service) => service.put(&parameter.name, &parameter.value, overwrite),
            Self::Remote(store) => store.put_parameter(parameter, overwrite).await,
        }
    }
}

/// A read-only view of parameters from whichever backend was selected.
pub enum ParameterReaderHandle {
    Local(KvClient),
    Remote(Arc<dyn ParameterStore>),
}

impl ParameterReaderHandle {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

#[async_trait]
impl ParameterReader for ParameterReaderHandle {
    async fn get_parameter(&self, name: &str) -> Result<String, KvError> {
        match self {
            Self::Local(client) => client.get(name),
            Self::Remote(store) => store.get_parameter(name).await,
        }
    }
}

pub struct BackendSelector {
    config: StandinConfig,
    backend: Backend,
    remote: Option<Arc<dyn RemoteBackends>>,
}

impl BackendSelector {
    /// Fails if a managed environment was detected but there is no way to reach it.
    pub fn new(
        config: StandinConfig,
        identity: Option<InstanceIdentity>,
        remote: Option<Arc<dyn RemoteBackends>>,
    ) -> Result<Self, ServicesError> {
        let backend = Backend::from_identity(identity);
        if backend.is_remote() && remote.is_none() {
            return Err(ServicesError::NoRemoteBackends);
        }
        match &backend {
            Backend::Remote(identity) => info!(
                "Using hosted backends in {} for instance {}",
                identity.region, identity.instance_id
            ),
            Backend::Local => info!("No managed environment detected, using local stand-ins"),
        }
        Ok(Self {
            config,
            backend,
            remote,
        })
    }

    /// Probes the environment and selects the backend from the answer.
    pub async fn detect(
        config: StandinConfig,
        probe: &dyn EnvironmentProbe,
        remote: Option<Arc<dyn RemoteBackends>>,
    ) -> Result<Self, ServicesError> {
        let identity = probe.probe().await;
        Self::new(config, identity, remote)
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn is_remote(&self) -> bool {
        self.backend.is_remote()
    }

    pub fn config(&self) -> &StandinConfig {
        &self.config
    }

    /// A read/write parameter store. Locally this starts the store service and its discovery
    /// responder.
    pub async fn open_parameter_store(&self) -> Result<ParameterStoreHandle, ServicesError> {
        match self.remote_identity()? {
            Some((remote, identity)) => Ok(ParameterStoreHandle::Remote(
                remote.parameter_store(identity)?,
            )),
            None => {
                let service = KvService::start(&self.config.kv_service_config()).await?;
                Ok(ParameterStoreHandle::Local(service))
            }
        }
    }

    /// A read-only parameter view. Locally this discovers a running store on the network.
    pub async fn connect_parameter_reader(&self) -> Result<ParameterReaderHandle, ServicesError> {
        match self.remote_identity()? {
            Some((remote, identity)) => Ok(ParameterReaderHandle::Remote(
                remote.parameter_store(identity)?,
            )),
            None => {
                let client = KvClient::discover(&self.config.kv_client_config()).await?;
                Ok(ParameterReaderHandle::Local(client))
            }
        }
    }

    /// A log handler; on a managed host it also starts delivery to the hosted log sink.
    pub async fn start_log_handler(&self) -> Result<LogHandler, ServicesError> {
        match self.remote_identity()? {
            Some((remote, identity)) => {
                let store = remote.parameter_store(identity)?;
                let level = self.remote_level(store.as_ref()).await;
                let sink = remote.log_sink(identity)?;
                let delivery_config = self.config.delivery_config(&identity.instance_id);
                debug!(
                    "Delivering logs to {}/{} at {}",
                    delivery_config.group, delivery_config.stream, level
                );
                Ok(LogHandler::with_sink(
                    self.config.handler_config(level),
                    delivery_config,
                    sink,
                ))
            }
            None => Ok(LogHandler::stdout_only(
                self.config.handler_config(self.config.level()),
            )),
        }
    }

    // Managed hosts log at debug when the verbose parameter says so.
    async fn remote_level(&self, store: &dyn ParameterStore) -> Level {
        let fallback = self.config.level();
        match store.get_parameter(&self.config.verbose_parameter).await {
            Ok(value) if value == "True" || value == "true" => Level::DEBUG,
            Ok(_) | Err(KvError::NotFound(_)) => fallback,
            Err(e) => {
                warn!(
                    "Could not read {}, using {}: {}",
                    self.config.verbose_parameter, fallback, e
                );
                fallback
            }
        }
    }

    fn remote_identity(
        &self,
    ) -> Result<Option<(&dyn RemoteBackends, &InstanceIdentity)>, ServicesError> {
        match &self.backend {
            Backend::Local => Ok(None),
            Backend::Remote(identity) => {
                let remote = self.remote.as_deref().ok_or(ServicesError::NoRemoteBackends)?;
                Ok(Some((remote, identity)))
            }
        }
    }
}
