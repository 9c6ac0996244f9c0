// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Self-hosted parameter store.
//!
//! A [`service::KvService`] keeps every parameter in a single snapshot file and answers UDP
//! discovery requests with the full snapshot, so that a [`client::KvClient`] on the same
//! network segment can read parameters without any address configuration.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod constants;
pub mod discovery;
pub mod errors;
pub mod parameter;
pub mod service;
pub mod snapshot;
