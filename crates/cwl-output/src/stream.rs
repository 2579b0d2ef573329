// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-destination sequencing state.
//!
//! ```text
//!            discover / create
//!   Unknown ──────────────────> Ready(token)
//!      ^                            │
//!      │     invalid token          │ append ok: Ready(next)
//!      └────────────────────────────┘
//! ```
//!
//! The token survives across flush cycles until the service rejects it.
//! Pending events are dropped after every flush attempt, successful or not,
//! so a batch that may have partially landed is never resubmitted.

use tracing::{debug, info, warn};

use crate::client::{ClientError, LogStreamClient, RejectedEvents};
use crate::errors::FlushError;
use crate::event::{Destination, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceToken {
    /// Nothing cached; the next flush has to ask the service.
    Unknown,
    /// Cached token. `None` means the stream exists but is still empty.
    Ready(Option<String>),
}

#[derive(Debug)]
pub struct StreamState {
    destination: Destination,
    token: SequenceToken,
    pending: Vec<Event>,
}

impl StreamState {
    #[must_use]
    pub fn new(destination: Destination) -> Self {
        StreamState {
            destination,
            token: SequenceToken::Unknown,
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, event: Event) {
        self.pending.push(event);
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    #[must_use]
    pub fn token(&self) -> &SequenceToken {
        &self.token
    }

    #[must_use]
    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    /// Discovers or creates the stream, then appends everything pending.
    ///
    /// Streams with nothing pending are left alone and never touch the network.
    pub async fn flush(
        &mut self,
        client: &dyn LogStreamClient,
        discovery_attempts: usize,
    ) -> Result<(), FlushError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        debug!(
            "{}: flushing {} events",
            self.destination,
            self.pending.len()
        );

        let events = std::mem::take(&mut self.pending);
        self.ensure_ready(client, discovery_attempts).await?;
        self.append(client, events).await
    }

    /// Makes sure a token is cached, looking the stream up (and creating it if
    /// needed) when it is not.
    ///
    /// A create that loses the race to another writer restarts discovery, at
    /// most `max_attempts` rounds in total.
    pub async fn ensure_ready(
        &mut self,
        client: &dyn LogStreamClient,
        max_attempts: usize,
    ) -> Result<(), FlushError> {
        if let SequenceToken::Ready(_) = self.token {
            return Ok(());
        }

        let group = self.destination.group();
        let stream = self.destination.stream();

        for attempt in 1..=max_attempts {
            let streams = client
                .describe_log_streams(group, stream)
                .await
                .map_err(|source| FlushError::DiscoveryFailed {
                    destination: self.destination.clone(),
                    source,
                })?;

            if let Some(found) = streams.into_iter().find(|s| s.name == stream) {
                debug!("{}: found existing log stream", self.destination);
                self.token = SequenceToken::Ready(found.upload_sequence_token);
                return Ok(());
            }

            match client.create_log_stream(group, stream).await {
                Ok(()) => {
                    info!("{}: created log stream", self.destination);
                    self.token = SequenceToken::Ready(None);
                    return Ok(());
                }
                Err(ClientError::AlreadyExists(_)) => {
                    debug!(
                        "{}: log stream already exists, rediscovering (attempt {attempt}/{max_attempts})",
                        self.destination
                    );
                }
                Err(source) => {
                    return Err(FlushError::CreateFailed {
                        destination: self.destination.clone(),
                        source,
                    });
                }
            }
        }

        Err(FlushError::CreateRaceExhausted {
            destination: self.destination.clone(),
            attempts: max_attempts,
        })
    }

    /// Sends the whole pending buffer as one request with the cached token.
    /// An empty buffer is a no-op.
    ///
    /// Fails with [`FlushError::NotReady`] and keeps the buffer when no token
    /// is cached; call [`StreamState::ensure_ready`] first.
    pub async fn append_pending(&mut self, client: &dyn LogStreamClient) -> Result<(), FlushError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.token == SequenceToken::Unknown {
            return Err(FlushError::NotReady {
                destination: self.destination.clone(),
            });
        }
        let events = std::mem::take(&mut self.pending);
        self.append(client, events).await
    }

    async fn append(
        &mut self,
        client: &dyn LogStreamClient,
        events: Vec<Event>,
    ) -> Result<(), FlushError> {
        let SequenceToken::Ready(token) = &self.token else {
            return Err(FlushError::NotReady {
                destination: self.destination.clone(),
            });
        };
        let token = token.as_deref();

        let result = client
            .put_log_events(
                self.destination.group(),
                self.destination.stream(),
                token,
                &events,
            )
            .await;

        match result {
            Ok(outcome) => {
                if let Some(rejected) = outcome.rejected.filter(|r| !r.is_empty()) {
                    log_rejected(&self.destination, &rejected, events.len());
                }
                debug!("{}: put {} events", self.destination, events.len());
                self.token = SequenceToken::Ready(outcome.next_sequence_token);
                Ok(())
            }
            // An earlier attempt of this request already landed.
            Err(ClientError::DataAlreadyAccepted { expected }) => {
                info!(
                    "{}: {} events already accepted by the service",
                    self.destination,
                    events.len()
                );
                self.token = match expected {
                    Some(token) => SequenceToken::Ready(Some(token)),
                    None => SequenceToken::Unknown,
                };
                Ok(())
            }
            Err(source @ ClientError::InvalidSequenceToken { .. }) => {
                self.token = SequenceToken::Unknown;
                Err(FlushError::AppendConflict {
                    destination: self.destination.clone(),
                    source,
                })
            }
            Err(source) => Err(FlushError::AppendTransport {
                destination: self.destination.clone(),
                source,
            }),
        }
    }
}

fn log_rejected(destination: &Destination, rejected: &RejectedEvents, sent: usize) {
    if let Some(index) = rejected.too_new_start_index {
        warn!("{destination}: events from index {index} of {sent} rejected as too new");
    }
    if let Some(index) = rejected.too_old_end_index {
        warn!("{destination}: events up to index {index} of {sent} rejected as too old");
    }
    if let Some(index) = rejected.expired_end_index {
        warn!("{destination}: events up to index {index} of {sent} rejected as expired");
    }
}
