// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Name the plugin registers with the host.
pub const PLUGIN_NAME: &str = "cwl";

/// Service API version used in the `X-Amz-Target` header.
pub const SERVICE_TARGET_PREFIX: &str = "Logs_20140328";
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Upper bound on describe -> create rounds when another writer keeps
/// winning the create race for the same stream name.
pub const DEFAULT_DISCOVERY_ATTEMPTS: usize = 5;

/// Destinations flushed concurrently within one flush cycle.
pub const DEFAULT_FLUSH_CONCURRENCY: usize = 8;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u64 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// MessagePack extension type carrying a (seconds, nanoseconds) event time.
pub const EVENT_TIME_EXT_TYPE: i8 = 0;
