// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DISCOVERY_ATTEMPTS, DEFAULT_FLUSH_CONCURRENCY, DEFAULT_LOG_LEVEL, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_DELAY_MS,
};
use crate::errors::ConfigError;
use crate::http_client::RetryStrategy;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Plugin configuration, resolved once at init.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Record field holding the log message
    pub message_key: String,
    /// Record field naming the destination log group
    pub log_group_name_key: String,
    /// Record field naming the destination log stream
    pub log_stream_name_key: String,
    /// Base URL of the log service
    pub endpoint: String,
    pub https_proxy: Option<String>,
    pub request_timeout: Duration,
    pub retry_strategy: RetryStrategy,
    pub flush_concurrency: usize,
    pub discovery_attempts: usize,
    pub log_level: String,
}

impl Config {
    /// Resolves every setting from the host first, then from the environment.
    ///
    /// `lookup` receives host configuration keys such as `MessageKey`; empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |key: &str, env_keys: &[&str]| -> Option<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| {
                    env_keys
                        .iter()
                        .find_map(|k| env::var(k).ok().filter(|v| !v.trim().is_empty()))
                })
                .map(|v| v.trim().to_string())
        };

        let message_key = setting("MessageKey", &["CWL_MESSAGE_KEY"])
            .ok_or(ConfigError::Missing("MessageKey"))?;
        let log_group_name_key = setting("LogGroupNameKey", &["CWL_LOG_GROUP_NAME_KEY"])
            .ok_or(ConfigError::Missing("LogGroupNameKey"))?;
        let log_stream_name_key = setting("LogStreamNameKey", &["CWL_LOG_STREAM_NAME_KEY"])
            .ok_or(ConfigError::Missing("LogStreamNameKey"))?;

        // Requests go out unsigned, so the endpoint has to be a signing proxy
        // or an emulator and is never derived from a region.
        let endpoint = setting("Endpoint", &["CWL_ENDPOINT"])
            .ok_or(ConfigError::Missing("Endpoint"))?
            .trim_end_matches('/')
            .to_string();

        let https_proxy = setting("HttpsProxy", &["HTTPS_PROXY"]);

        let request_timeout = parse_setting::<u64>(
            setting("RequestTimeout", &["CWL_REQUEST_TIMEOUT"]),
            "RequestTimeout",
        )?
        .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        let max_retries = parse_setting::<u64>(
            setting("MaxRetries", &["CWL_MAX_RETRIES"]),
            "MaxRetries",
        )?
        .unwrap_or(DEFAULT_MAX_RETRIES);

        let flush_concurrency = parse_setting::<usize>(
            setting("FlushConcurrency", &["CWL_FLUSH_CONCURRENCY"]),
            "FlushConcurrency",
        )?
        .unwrap_or(DEFAULT_FLUSH_CONCURRENCY);

        let discovery_attempts = parse_setting::<usize>(
            setting("DiscoveryAttempts", &["CWL_DISCOVERY_ATTEMPTS"]),
            "DiscoveryAttempts",
        )?
        .unwrap_or(DEFAULT_DISCOVERY_ATTEMPTS);

        let log_level = setting("LogLevel", &["CWL_LOG_LEVEL"])
            .map(|v| v.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let config = Config {
            message_key,
            log_group_name_key,
            log_stream_name_key,
            endpoint,
            https_proxy,
            request_timeout,
            retry_strategy: RetryStrategy::LinearBackoff(max_retries, DEFAULT_RETRY_DELAY_MS),
            flush_concurrency,
            discovery_attempts,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "FlushConcurrency",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.discovery_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "DiscoveryAttempts",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.retry_strategy.attempts() == 0 {
            return Err(ConfigError::Invalid {
                key: "MaxRetries",
                reason: "must be greater than 0".to_string(),
            });
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "Endpoint",
                reason: format!("'{}' is not an http(s) URL", self.endpoint),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid {
                key: "LogLevel",
                reason: format!(
                    "'{}' must be one of: trace, debug, info, warn, error",
                    self.log_level
                ),
            });
        }

        Ok(())
    }
}

fn parse_setting<T: FromStr>(
    value: Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("'{v}': {e}"),
            })
        })
        .transpose()
}
