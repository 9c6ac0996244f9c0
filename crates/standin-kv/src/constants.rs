// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Port the discovery responder listens on unless configured otherwise.
pub const DEFAULT_DISCOVERY_PORT: u16 = 1026;

/// Storage file used when no path is configured.
pub const DEFAULT_STORAGE_PATH: &str = "kvstore";

/// Upper bound on a serialized snapshot, in bytes.
pub const MAX_SNAPSHOT_BYTES: usize = 65536;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DISCOVERY_PAYLOAD_BYTES: usize = 65507;

/// Largest snapshot that is stored; every stored snapshot fits in one discovery reply.
pub const SNAPSHOT_LIMIT: usize = if MAX_DISCOVERY_PAYLOAD_BYTES < MAX_SNAPSHOT_BYTES {
    MAX_DISCOVERY_PAYLOAD_BYTES
} else {
    MAX_SNAPSHOT_BYTES
};

/// How long a client waits for a discovery reply.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Receive buffer for discovery replies; large enough for any UDP payload.
pub const MAX_DATAGRAM_BYTES: usize = 65536;
