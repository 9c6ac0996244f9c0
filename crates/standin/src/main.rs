// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;

use tracing::{debug, error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use standin_core::{
    backend::{BackendSelector, ParameterStoreHandle},
    config::StandinConfig,
    error::ServicesError,
    probe::InstanceMetadataProbe,
};
use standin_log::layer::DeliveryLayer;

#[tokio::main]
pub async fn main() {
    let config = match StandinConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("standin: {e}");
            return;
        }
    };

    let probe = match InstanceMetadataProbe::new(config.metadata_url.clone(), config.probe_timeout)
    {
        Ok(probe) => probe,
        Err(e) => {
            eprintln!("standin: {e}");
            return;
        }
    };

    // No remote factory: a managed host has nothing to stand in for.
    let selector = match BackendSelector::detect(config, &probe, None).await {
        Ok(selector) => selector,
        Err(ServicesError::NoRemoteBackends) => {
            eprintln!("standin: managed environment detected, nothing to stand in for");
            return;
        }
        Err(e) => {
            eprintln!("standin: {e}");
            return;
        }
    };

    let handler = match selector.start_log_handler().await {
        Ok(handler) => Arc::new(handler),
        Err(e) => {
            eprintln!("standin: could not start logging: {e}");
            return;
        }
    };

    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,{}",
        handler.max_level().as_str().to_lowercase()
    );
    let filter = match EnvFilter::try_new(env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("standin: could not parse log level in configuration: {e}");
            return;
        }
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(DeliveryLayer::new(Arc::clone(&handler)));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("standin: setting default subscriber failed: {e}");
        return;
    }

    debug!("Logging subsystem enabled");

    let mut store = match selector.open_parameter_store().await {
        Ok(store) => store,
        Err(e) => {
            error!("Could not open parameter store: {}", e);
            handler.stop().await;
            return;
        }
    };

    match &store {
        ParameterStoreHandle::Local(service) => match service.discovery_addr() {
            Some(addr) => info!(
                "Serving {} on {}",
                selector.config().storage_path.display(),
                addr
            ),
            None => info!(
                "Serving {} without discovery",
                selector.config().storage_path.display()
            ),
        },
        ParameterStoreHandle::Remote(_) => info!("Using hosted parameter store"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not wait for shutdown signal: {}", e);
    }

    info!("Shutting down");
    store.stop().await;
    handler.stop().await;
}
