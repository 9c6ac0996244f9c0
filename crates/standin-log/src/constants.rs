// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Pause between attempts when the sink asks us to back off.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Logger name prefixes that are never printed or shipped.
///
/// The HTTP stack underneath a remote sink logs about every request it makes.
pub const EXCLUDED_LOGGER_PREFIXES: &[&str] = &["hyper", "h2", "reqwest", "rustls"];

/// Logger name prefix of the pipeline's own notices: printed, never shipped, so delivery
/// problems reach the operator without feeding back into delivery.
pub const PIPELINE_LOGGER_PREFIX: &str = "standin_log";

/// Width the level name is padded to in formatted records.
pub const LEVEL_WIDTH: usize = 8;
