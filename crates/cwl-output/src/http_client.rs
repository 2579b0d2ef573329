// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`LogStreamClient`] over the log service's JSON 1.1 RPC protocol.
//!
//! Every operation is a `POST /` whose `X-Amz-Target` header names the
//! operation. Requests are not signed; the endpoint is expected to be a
//! signing proxy or a compatible emulator.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::client::{ClientError, LogStreamClient, PutOutcome, RejectedEvents, StreamDescriptor};
use crate::config::Config;
use crate::constants::{CONTENT_TYPE as AMZ_JSON, SERVICE_TARGET_PREFIX};
use crate::event::Event;

const TARGET_HEADER: &str = "X-Amz-Target";

/// How many times a request is sent and how long to wait between sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Number of attempts, no delay.
    Immediate(u64),
    /// Number of attempts, delay in milliseconds multiplied by the attempt number.
    LinearBackoff(u64, u64),
}

impl RetryStrategy {
    #[must_use]
    pub fn attempts(&self) -> u64 {
        match *self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                attempts
            }
        }
    }

    async fn wait(&self, attempt: u64) {
        if let RetryStrategy::LinearBackoff(_, delay) = *self {
            tokio::time::sleep(Duration::from_millis(delay.saturating_mul(attempt))).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpLogStreamClient {
    client: reqwest::Client,
    endpoint: String,
    retry_strategy: RetryStrategy,
}

impl HttpLogStreamClient {
    /// Builds a client from the resolved plugin configuration.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Some(Duration::from_secs(270)))
            .tcp_keepalive(Some(Duration::from_secs(120)));

        if let Some(proxy) = &config.https_proxy {
            builder = builder.proxy(reqwest::Proxy::https(proxy)?);
        }

        Ok(Self::with_client(
            builder.build()?,
            config.endpoint.as_str(),
            config.retry_strategy,
        ))
    }

    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        retry_strategy: RetryStrategy,
    ) -> Self {
        let endpoint = endpoint.into();
        HttpLogStreamClient {
            client,
            endpoint: format!("{}/", endpoint.trim_end_matches('/')),
            retry_strategy,
        }
    }

    fn headers(operation: &str) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();
        let target = HeaderValue::from_str(&format!("{SERVICE_TARGET_PREFIX}.{operation}"))
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        headers.insert(TARGET_HEADER, target);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON));
        Ok(headers)
    }

    /// Sends one operation, retrying network errors and 5xx responses.
    /// Returns the raw response body of the first successful attempt.
    async fn call<T: Serialize + Sync>(
        &self,
        operation: &str,
        body: &T,
    ) -> Result<Vec<u8>, ClientError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| ClientError::Transport(e.to_string()))?;
        let headers = Self::headers(operation)?;
        let attempts = self.retry_strategy.attempts().max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();
            let result = self
                .client
                .post(&self.endpoint)
                .headers(headers.clone())
                .body(payload.clone())
                .send()
                .await;
            let elapsed = start.elapsed();

            let err = match result {
                Ok(resp) => {
                    let status = resp.status();
                    match resp.bytes().await {
                        Ok(body) if status.is_success() => return Ok(body.to_vec()),
                        Ok(body) => {
                            let err = service_error(status.as_u16(), &body);
                            if !status.is_server_error() {
                                return Err(err);
                            }
                            err
                        }
                        Err(e) => {
                            ClientError::Transport(format!("failed to read response body: {e}"))
                        }
                    }
                }
                Err(e) => ClientError::Transport(e.to_string()),
            };

            if attempt >= attempts {
                error!(
                    "{operation} failed after {} ms and {attempt} attempts: {err}",
                    elapsed.as_millis()
                );
                return Err(err);
            }
            debug!("{operation} attempt {attempt} failed, retrying: {err}");
            self.retry_strategy.wait(attempt).await;
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<LogStreamEntry>,
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStreamEntry {
    log_stream_name: String,
    upload_sequence_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: Vec<InputLogEvent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Serialize)]
struct InputLogEvent<'a> {
    timestamp: i64,
    message: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<RejectedLogEventsInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectedLogEventsInfo {
    too_new_log_event_start_index: Option<usize>,
    too_old_log_event_end_index: Option<usize>,
    expired_log_event_end_index: Option<usize>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
    expected_sequence_token: Option<String>,
}

/// Maps an error response to a [`ClientError`]. `__type` may be prefixed with
/// a namespace, as in `com.amazonaws.logs#ResourceAlreadyExistsException`.
fn service_error(status: u16, body: &[u8]) -> ClientError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let code = parsed
        .kind
        .as_deref()
        .map(|kind| kind.rsplit('#').next().unwrap_or(kind).to_string())
        .unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    match code.as_str() {
        "ResourceAlreadyExistsException" => ClientError::AlreadyExists(message),
        "InvalidSequenceTokenException" => ClientError::InvalidSequenceToken {
            expected: parsed.expected_sequence_token,
        },
        "DataAlreadyAcceptedException" => ClientError::DataAlreadyAccepted {
            expected: parsed.expected_sequence_token,
        },
        _ => ClientError::Service {
            status,
            code,
            message,
        },
    }
}

fn parse<T: for<'de> Deserialize<'de> + Default>(body: &[u8]) -> Result<T, ClientError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ClientError::Transport(format!("unexpected response body: {e}")))
}

#[async_trait]
impl LogStreamClient for HttpLogStreamClient {
    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescriptor>, ClientError> {
        let mut streams = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let request = DescribeLogStreamsRequest {
                log_group_name: group,
                log_stream_name_prefix: prefix,
                next_token: next_token.as_deref(),
            };
            let body = self.call("DescribeLogStreams", &request).await?;
            let page: DescribeLogStreamsResponse = parse(&body)?;

            let found_exact = page.log_streams.iter().any(|s| s.log_stream_name == prefix);
            streams.extend(page.log_streams.into_iter().map(|s| StreamDescriptor {
                name: s.log_stream_name,
                upload_sequence_token: s.upload_sequence_token,
            }));
            if found_exact {
                break;
            }

            match page.next_token {
                Some(token) if next_token.as_deref() != Some(token.as_str()) => {
                    next_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(streams)
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), ClientError> {
        let request = CreateLogStreamRequest {
            log_group_name: group,
            log_stream_name: stream,
        };
        self.call("CreateLogStream", &request).await.map(|_| ())
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        token: Option<&str>,
        events: &[Event],
    ) -> Result<PutOutcome, ClientError> {
        let request = PutLogEventsRequest {
            log_group_name: group,
            log_stream_name: stream,
            log_events: events
                .iter()
                .map(|e| InputLogEvent {
                    timestamp: e.timestamp(),
                    message: e.message(),
                })
                .collect(),
            sequence_token: token,
        };
        let body = self.call("PutLogEvents", &request).await?;
        let response: PutLogEventsResponse = parse(&body)?;

        Ok(PutOutcome {
            next_sequence_token: response.next_sequence_token,
            rejected: response.rejected_log_events_info.map(|r| RejectedEvents {
                too_new_start_index: r.too_new_log_event_start_index,
                too_old_end_index: r.too_old_log_event_end_index,
                expired_end_index: r.expired_log_event_end_index,
            }),
        })
    }
}
