// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::client::LogStreamClient;
use crate::config::Config;
use crate::constants::PLUGIN_NAME;
use crate::decoder::BatchDecoder;
use crate::errors::{FlushErrors, InitError};
use crate::extractor::Extractor;
use crate::http_client::HttpLogStreamClient;
use crate::multiplexer::Multiplexer;

/// Counters for one flushed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Entries decoded from the batch
    pub decoded: usize,
    /// Entries routed to a destination
    pub routed: usize,
    /// Entries dropped because a required field was unusable
    pub skipped: usize,
    /// Destinations flushed this cycle
    pub destinations: usize,
}

/// One configured output instance: decode, extract, route, flush.
pub struct Plugin {
    extractor: Extractor,
    multiplexer: Multiplexer,
}

impl Plugin {
    #[must_use]
    pub fn new(config: &Config, client: Arc<dyn LogStreamClient>) -> Self {
        Plugin {
            extractor: Extractor::from_config(config),
            multiplexer: Multiplexer::new(client)
                .with_flush_concurrency(config.flush_concurrency)
                .with_discovery_attempts(config.discovery_attempts),
        }
    }

    /// Builds the plugin with an HTTP client pointed at `config.endpoint`.
    pub fn init(config: &Config) -> Result<Self, InitError> {
        config.validate()?;
        let client = HttpLogStreamClient::new(config)?;
        info!(
            "{PLUGIN_NAME} output initialized: endpoint={} message_key={} group_key={} stream_key={}",
            config.endpoint,
            config.message_key,
            config.log_group_name_key,
            config.log_stream_name_key
        );
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Processes one raw batch from the host.
    ///
    /// Records that cannot be routed are logged and skipped. A malformed
    /// batch element ends decoding; everything before it is still shipped.
    /// Returns every destination failure of this cycle. Failed events are
    /// not kept for the next one.
    pub async fn flush(&mut self, data: &[u8]) -> Result<BatchSummary, FlushErrors> {
        let mut summary = BatchSummary::default();

        for entry in BatchDecoder::new(data) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    error!("{err}");
                    break;
                }
            };
            summary.decoded += 1;

            match self.extractor.extract(&entry) {
                Ok((destination, event)) => {
                    self.multiplexer.route(destination, event);
                    summary.routed += 1;
                }
                Err(err) => {
                    warn!("Skipping record: {err}");
                    summary.skipped += 1;
                }
            }
        }

        summary.destinations = self.multiplexer.pending_destinations();
        let errors = self.multiplexer.flush_all().await;
        debug!(
            "batch done: decoded={} routed={} skipped={} destinations={} failed={}",
            summary.decoded,
            summary.routed,
            summary.skipped,
            summary.destinations,
            errors.len()
        );

        if errors.occurred() {
            return Err(errors);
        }
        Ok(summary)
    }

    /// Number of destinations seen since init.
    #[must_use]
    pub fn destinations(&self) -> usize {
        self.multiplexer.len()
    }

    /// Drops every stream state.
    pub fn exit(self) {
        info!(
            "shutting down, {} destinations tracked",
            self.multiplexer.len()
        );
    }
}
