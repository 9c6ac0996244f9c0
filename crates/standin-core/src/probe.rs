// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Managed environment detection.
//!
//! A managed host serves an instance identity document on a link-local address. If it answers,
//! the hosted backends are used; if the request fails for any reason, the process is running
//! somewhere else and the local stand-ins take over.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::ServicesError;

pub const DEFAULT_METADATA_URL: &str =
    "http://169.254.169.254/latest/dynamic/instance-identity/document";

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Identity of the managed host we are running on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceIdentity {
    pub region: String,
    #[serde(rename = "instanceId")]
    pub instance_id: String,
}

#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    /// `Some` on a managed host, `None` everywhere else.
    async fn probe(&self) -> Option<InstanceIdentity>;
}

/// A probe with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticProbe(Option<InstanceIdentity>);

impl StaticProbe {
    pub fn local() -> Self {
        Self(None)
    }

    pub fn managed(identity: InstanceIdentity) -> Self {
        Self(Some(identity))
    }
}

#[async_trait]
impl EnvironmentProbe for StaticProbe {
    async fn probe(&self) -> Option<InstanceIdentity> {
        self.0.clone()
    }
}

/// Asks the instance metadata endpoint, once, who we are.
#[derive(Debug)]
pub struct InstanceMetadataProbe {
    client: reqwest::Client,
    url: String,
    identity: OnceCell<Option<InstanceIdentity>>,
}

impl InstanceMetadataProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ServicesError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServicesError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            identity: OnceCell::new(),
        })
    }

    async fn fetch(&self) -> Option<InstanceIdentity> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("No instance metadata at {}: {}", self.url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("Instance metadata returned {}", response.status());
            return None;
        }
        match response.json::<InstanceIdentity>().await {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!("Unreadable instance identity document: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl EnvironmentProbe for InstanceMetadataProbe {
    async fn probe(&self) -> Option<InstanceIdentity> {
        self.identity
            .get_or_init(|| async { self.fetch().await })
            .await
            .clone()
    }
}
