// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use standin_kv::errors::KvError;

/// Errors raised while configuring or starting backends
#[derive(Debug, thiserror::Error)]
pub enum ServicesError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Managed environment detected but no remote backends are available")]
    NoRemoteBackends,

    #[error("Failed to create remote client: {0}")]
    RemoteUnavailable(String),

    #[error("Parameter store error: {0}")]
    Kv(#[from] KvError),
}
