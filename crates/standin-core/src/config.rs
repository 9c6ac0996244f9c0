// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use standin_kv::client::KvClientConfig;
use standin_kv::constants::{DEFAULT_DISCOVERY_PORT, DEFAULT_STORAGE_PATH, DISCOVERY_TIMEOUT};
use standin_kv::service::KvServiceConfig;
use standin_log::constants::RETRY_BACKOFF;
use standin_log::delivery_service::DeliveryConfig;
use standin_log::handler::HandlerConfig;
use tracing::Level;

use crate::error::ServicesError;
use crate::probe::{DEFAULT_METADATA_URL, DEFAULT_PROBE_TIMEOUT};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the parameter store and log pipeline
#[derive(Debug, Clone)]
pub struct StandinConfig {
    /// Snapshot file of the local parameter store
    pub storage_path: PathBuf,
    /// Host the discovery responder binds to
    pub discovery_host: String,
    /// Address discovery requests are sent to
    pub discovery_target: IpAddr,
    /// Discovery port, shared by responder and clients
    pub discovery_port: u16,
    /// Whether the local store answers discovery requests
    pub serve_discovery: bool,
    /// Remote log group
    pub log_group: String,
    /// Remote log stream; the instance id is appended on managed hosts
    pub log_stream: String,
    /// Substrings that suppress a log line entirely
    pub log_blacklist: Vec<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// Parameter that switches managed hosts to debug logging when set to "true"
    pub verbose_parameter: String,
    /// Pause between delivery attempts when the log sink throttles
    pub retry_backoff: Duration,
    /// Instance identity document endpoint
    pub metadata_url: String,
    pub probe_timeout: Duration,
}

impl Default for StandinConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            discovery_host: "0.0.0.0".to_string(),
            discovery_target: IpAddr::V4(Ipv4Addr::BROADCAST),
            discovery_port: DEFAULT_DISCOVERY_PORT,
            serve_discovery: true,
            log_group: "standin".to_string(),
            log_stream: "default".to_string(),
            log_blacklist: Vec::new(),
            log_level: "info".to_string(),
            verbose_parameter: "/standin/verbose".to_string(),
            retry_backoff: RETRY_BACKOFF,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl StandinConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ServicesError> {
        let defaults = Self::default();

        let storage_path = env::var("STANDIN_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_path);
        let discovery_host = env::var("STANDIN_DISCOVERY_HOST").unwrap_or(defaults.discovery_host);
        let discovery_target = match env::var("STANDIN_DISCOVERY_TARGET") {
            Ok(val) => IpAddr::from_str(val.trim()).map_err(|e| {
                ServicesError::InvalidConfig(format!(
                    "STANDIN_DISCOVERY_TARGET '{val}' is not an IP address: {e}"
                ))
            })?,
            Err(_) => defaults.discovery_target,
        };
        let discovery_port = env::var("STANDIN_DISCOVERY_PORT")
            .ok()
            .and_then(|port| port.parse::<u16>().ok())
            .unwrap_or(defaults.discovery_port);
        let serve_discovery = env::var("STANDIN_NO_SERVER")
            .map(|val| val.to_lowercase() != "true")
            .unwrap_or(defaults.serve_discovery);
        let log_group = env::var("STANDIN_LOG_GROUP").unwrap_or(defaults.log_group);
        let log_stream = env::var("STANDIN_LOG_STREAM").unwrap_or(defaults.log_stream);
        let log_blacklist = env::var("STANDIN_LOG_BLACKLIST")
            .map(|val| parse_blacklist(&val))
            .unwrap_or(defaults.log_blacklist);
        let log_level = env::var("STANDIN_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);
        let verbose_parameter =
            env::var("STANDIN_VERBOSE_PARAMETER").unwrap_or(defaults.verbose_parameter);
        let retry_backoff = env::var("STANDIN_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|ms| ms.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);
        let metadata_url = env::var("STANDIN_METADATA_URL").unwrap_or(defaults.metadata_url);

        let config = Self {
            storage_path,
            discovery_host,
            discovery_target,
            discovery_port,
            serve_discovery,
            log_group,
            log_stream,
            log_blacklist,
            log_level,
            verbose_parameter,
            retry_backoff,
            metadata_url,
            probe_timeout: defaults.probe_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ServicesError> {
        if self.discovery_port == 0 {
            return Err(ServicesError::InvalidConfig(
                "discovery port must be greater than 0".to_string(),
            ));
        }

        if self.storage_path.as_os_str().is_empty() {
            return Err(ServicesError::InvalidConfig(
                "STANDIN_STORAGE_PATH cannot be empty".to_string(),
            ));
        }

        if self.log_group.trim().is_empty() || self.log_stream.trim().is_empty() {
            return Err(ServicesError::InvalidConfig(
                "log group and stream names cannot be empty".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ServicesError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// The configured log level; unknown names fall back to info.
    pub fn level(&self) -> Level {
        Level::from_str(&self.log_level).unwrap_or(Level::INFO)
    }

    pub fn kv_service_config(&self) -> KvServiceConfig {
        KvServiceConfig {
            storage_path: self.storage_path.clone(),
            host: self.discovery_host.clone(),
            port: self.discovery_port,
            serve_discovery: self.serve_discovery,
        }
    }

    pub fn kv_client_config(&self) -> KvClientConfig {
        KvClientConfig {
            broadcast_addr: self.discovery_target,
            port: self.discovery_port,
            timeout: DISCOVERY_TIMEOUT,
        }
    }

    pub fn handler_config(&self, max_level: Level) -> HandlerConfig {
        HandlerConfig {
            blacklist: self.log_blacklist.clone(),
            max_level,
        }
    }

    /// Delivery settings for the stream owned by `instance_id`.
    pub fn delivery_config(&self, instance_id: &str) -> DeliveryConfig {
        DeliveryConfig {
            group: self.log_group.clone(),
            stream: format!("{}/{}", self.log_stream, instance_id),
            retry_backoff: self.retry_backoff,
        }
    }
}

fn parse_blacklist(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
