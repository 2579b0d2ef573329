// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

use crate::client::LogStreamClient;
use crate::constants::{DEFAULT_DISCOVERY_ATTEMPTS, DEFAULT_FLUSH_CONCURRENCY};
use crate::errors::FlushErrors;
use crate::event::{Destination, Event};
use crate::stream::StreamState;

/// Routes events to lazily created per-destination [`StreamState`]s and
/// flushes all of them together.
///
/// The multiplexer exclusively owns every stream state. One flush cycle at a
/// time is expected per multiplexer (`flush_all` takes `&mut self`).
pub struct Multiplexer {
    client: Arc<dyn LogStreamClient>,
    streams: HashMap<Destination, StreamState>,
    flush_concurrency: usize,
    discovery_attempts: usize,
}

impl Multiplexer {
    #[must_use]
    pub fn new(client: Arc<dyn LogStreamClient>) -> Self {
        Multiplexer {
            client,
            streams: HashMap::new(),
            flush_concurrency: DEFAULT_FLUSH_CONCURRENCY,
            discovery_attempts: DEFAULT_DISCOVERY_ATTEMPTS,
        }
    }

    /// Caps how many destinations are flushed at the same time. 0 is treated as 1.
    #[must_use]
    pub fn with_flush_concurrency(mut self, flush_concurrency: usize) -> Self {
        self.flush_concurrency = flush_concurrency.max(1);
        self
    }

    /// Caps discover/create rounds per destination per flush. 0 is treated as 1.
    #[must_use]
    pub fn with_discovery_attempts(mut self, discovery_attempts: usize) -> Self {
        self.discovery_attempts = discovery_attempts.max(1);
        self
    }

    /// Buffers `event` for `destination`. Never performs I/O.
    pub fn route(&mut self, destination: Destination, event: Event) {
        self.streams
            .entry(destination)
            .or_insert_with_key(|destination| {
                debug!("{destination}: tracking new destination");
                StreamState::new(destination.clone())
            })
            .push(event);
    }

    /// Flushes every known destination independently.
    ///
    /// Each destination runs discover -> append in order; different
    /// destinations run concurrently, up to the configured limit. One failing
    /// destination never stops the others. All pending buffers are empty when
    /// this returns.
    pub async fn flush_all(&mut self) -> FlushErrors {
        let client = self.client.as_ref();
        let discovery_attempts = self.discovery_attempts;

        let results: Vec<_> = stream::iter(self.streams.values_mut())
            .map(|state| state.flush(client, discovery_attempts))
            .buffer_unordered(self.flush_concurrency)
            .collect()
            .await;

        let errors: FlushErrors = results.into_iter().filter_map(Result::err).collect();
        for err in &errors {
            error!("{err}");
        }
        errors
    }

    #[must_use]
    pub fn stream(&self, destination: &Destination) -> Option<&StreamState> {
        self.streams.get(destination)
    }

    /// Number of destinations with events waiting for the next flush.
    #[must_use]
    pub fn pending_destinations(&self) -> usize {
        self.streams
            .values()
            .filter(|s| !s.pending().is_empty())
            .count()
    }

    /// Number of destinations seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
