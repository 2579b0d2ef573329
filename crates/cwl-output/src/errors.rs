// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::client::ClientError;
use crate::event::Destination;
use std::fmt;

/// Startup configuration errors. These are the only errors that keep the
/// plugin from becoming ready.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' entry required")]
    Missing(&'static str),

    #[error("Invalid '{key}' entry: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Raised by [`crate::plugin::Plugin::init`].
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Per-record extraction errors. The record is skipped, the batch goes on.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("'{0}' attribute not found")]
    FieldMissing(String),

    #[error("'{field}' attribute should be text, found {found}")]
    FieldWrongType { field: String, found: &'static str },

    #[error("'{0}' attribute is empty")]
    FieldEmpty(String),
}

/// Raised when a batch element is not a valid `[time, record]` entry.
#[derive(Debug, thiserror::Error)]
#[error("Malformed batch entry at offset {offset}: {source}")]
pub struct DecodeError {
    pub offset: usize,
    #[source]
    pub source: rmp_serde::decode::Error,
}

/// Failure of one destination during a flush cycle. Never affects other
/// destinations.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("{destination}: failed to describe log streams: {source}")]
    DiscoveryFailed {
        destination: Destination,
        #[source]
        source: ClientError,
    },

    #[error("{destination}: failed to create log stream: {source}")]
    CreateFailed {
        destination: Destination,
        #[source]
        source: ClientError,
    },

    #[error("{destination}: log stream still missing after {attempts} discovery attempts")]
    CreateRaceExhausted {
        destination: Destination,
        attempts: usize,
    },

    #[error("{destination}: append attempted before the log stream was discovered")]
    NotReady { destination: Destination },

    #[error("{destination}: sequence token rejected, will rediscover: {source}")]
    AppendConflict {
        destination: Destination,
        #[source]
        source: ClientError,
    },

    #[error("{destination}: failed to put log events: {source}")]
    AppendTransport {
        destination: Destination,
        #[source]
        source: ClientError,
    },
}

impl FlushError {
    #[must_use]
    pub fn destination(&self) -> &Destination {
        match self {
            FlushError::DiscoveryFailed { destination, .. }
            | FlushError::CreateFailed { destination, .. }
            | FlushError::CreateRaceExhausted { destination, .. }
            | FlushError::NotReady { destination }
            | FlushError::AppendConflict { destination, .. }
            | FlushError::AppendTransport { destination, .. } => destination,
        }
    }
}

/// Every destination failure from one flush, in the order they were observed.
///
/// Collecting into this never short-circuits: each independent destination is
/// attempted and reported exactly once.
#[derive(Debug, Default)]
pub struct FlushErrors(Vec<FlushError>);

impl FlushErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FlushError) {
        self.0.push(error);
    }

    /// True if at least one destination failed.
    #[must_use]
    pub fn occurred(&self) -> bool {
        !self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FlushError> {
        self.0.iter()
    }
}

impl Extend<FlushError> for FlushErrors {
    fn extend<I: IntoIterator<Item = FlushError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<FlushError> for FlushErrors {
    fn from_iter<I: IntoIterator<Item = FlushError>>(iter: I) -> Self {
        FlushErrors(iter.into_iter().collect())
    }
}

impl IntoIterator for FlushErrors {
    type Item = FlushError;
    type IntoIter = std::vec::IntoIter<FlushError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FlushErrors {
    type Item = &'a FlushError;
    type IntoIter = std::slice::Iter<'a, FlushError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for FlushErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} destination(s) failed to flush", self.0.len())?;
        for error in &self.0 {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FlushErrors {}
