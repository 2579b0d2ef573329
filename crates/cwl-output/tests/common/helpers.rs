// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch and config builders shared by integration tests

use cwl_output::config::Config;
use cwl_output::http_client::RetryStrategy;
use std::collections::BTreeMap;
use std::time::Duration;

/// Encodes `[time, {"log", "group", "stream"}]` entries the way the host does.
#[allow(dead_code)]
pub fn encode_batch(entries: &[(u64, &str, &str, &str)]) -> Vec<u8> {
    let mut data = Vec::new();
    for (time, message, group, stream) in entries {
        let record: BTreeMap<&str, &str> = [("log", *message), ("group", *group), ("stream", *stream)]
            .into_iter()
            .collect();
        data.extend(rmp_serde::to_vec(&(*time, record)).expect("encode entry"));
    }
    data
}

#[allow(dead_code)]
pub fn test_config(endpoint: &str) -> Config {
    Config {
        message_key: "log".to_string(),
        log_group_name_key: "group".to_string(),
        log_stream_name_key: "stream".to_string(),
        endpoint: endpoint.to_string(),
        https_proxy: None,
        request_timeout: Duration::from_secs(5),
        retry_strategy: RetryStrategy::Immediate(1),
        flush_concurrency: 4,
        discovery_attempts: 5,
        log_level: "debug".to_string(),
    }
}
