// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parameter types and the store traits shared by local and remote backends.
//!
//! Callers program against [`ParameterStore`] and [`ParameterReader`]; whether the value lives in
//! a hosted parameter store or in a local snapshot file is decided once, when the store is built.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::KvError;

/// Kind of a parameter, mirrored from hosted parameter stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    #[default]
    String,
    SecureString,
    StringList,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::SecureString => "SecureString",
            Self::StringList => "StringList",
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named configuration value.
///
/// Only `name` and `value` are persisted by the local store; `parameter_type` and `description`
/// are carried for remote stores that keep them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub parameter_type: ParameterType,
    pub description: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            parameter_type: ParameterType::default(),
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, parameter_type: ParameterType) -> Self {
        self.parameter_type = parameter_type;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Read access to parameters.
#[async_trait]
pub trait ParameterReader: Send + Sync {
    /// Returns the value stored under `name`, or [`KvError::NotFound`].
    async fn get_parameter(&self, name: &str) -> Result<String, KvError>;
}

/// Read and write access to parameters.
#[async_trait]
pub trait ParameterStore: ParameterReader {
    /// Stores `parameter`.
    ///
    /// Fails with [`KvError::AlreadyExists`] when the name is taken and `overwrite` is false, in
    /// which case the stored value is left as it was.
    async fn put_parameter(&self, parameter: Parameter, overwrite: bool) -> Result<(), KvError>;
}
