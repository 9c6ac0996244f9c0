// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Backend selection for parameters and logs.
//!
//! The environment is probed once; on a managed host the hosted services are used through the
//! [`backend::RemoteBackends`] factory, everywhere else the self-hosted stand-ins from
//! `standin-kv` and `standin-log` take their place behind the same traits.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod backend;
pub mod config;
pub mod error;
pub mod probe;
