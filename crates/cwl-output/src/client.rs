// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::event::Event;

/// A log stream as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub name: String,
    /// `None` for a stream that has never been written to.
    pub upload_sequence_token: Option<String>,
}

/// Index ranges of events the service accepted the request for but dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectedEvents {
    pub too_new_start_index: Option<usize>,
    pub too_old_end_index: Option<usize>,
    pub expired_end_index: Option<usize>,
}

impl RejectedEvents {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.too_new_start_index.is_none()
            && self.too_old_end_index.is_none()
            && self.expired_end_index.is_none()
    }
}

/// Result of a successful append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub next_sequence_token: Option<String>,
    pub rejected: Option<RejectedEvents>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    /// Lost a create race with another writer.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The supplied token no longer matches the stream.
    #[error("invalid sequence token (expected {expected:?})")]
    InvalidSequenceToken { expected: Option<String> },

    #[error("data already accepted (expected {expected:?})")]
    DataAlreadyAccepted { expected: Option<String> },

    #[error("{status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote log stream service.
///
/// Implementations own their transport, authentication and timeouts. The
/// multiplexer only relies on the three operations below.
#[async_trait]
pub trait LogStreamClient: Send + Sync {
    /// Lists streams in `group` whose name starts with `prefix`.
    ///
    /// Listing may stop early once a stream named exactly `prefix` is seen.
    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescriptor>, ClientError>;

    /// Fails with [`ClientError::AlreadyExists`] when the stream is already there.
    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), ClientError>;

    /// Appends `events` in order. `token` is `None` for a never-written stream.
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        token: Option<&str>,
        events: &[Event],
    ) -> Result<PutOutcome, ClientError>;
}
