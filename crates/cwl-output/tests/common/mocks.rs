// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory log service for exercising the multiplexer without a network

use async_trait::async_trait;
use cwl_output::client::{ClientError, LogStreamClient, PutOutcome, StreamDescriptor};
use cwl_output::event::Event;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default, Clone)]
pub struct StoredStream {
    pub token: Option<String>,
    pub events: Vec<(String, i64)>,
}

#[derive(Debug, Default)]
struct State {
    streams: HashMap<(String, String), StoredStream>,
    next_token: u64,
    describes: usize,
    creates: usize,
    puts: Vec<(String, usize)>,
    failing_puts: HashSet<String>,
    hidden: HashSet<String>,
}

/// Mock service that enforces sequence tokens like the real one.
///
/// Every successful append rotates the stream's token. A stream can be made
/// to fail appends, or hidden from describe calls to simulate a writer that
/// keeps winning the create race.
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct MockLogService {
    state: Mutex<State>,
}

#[allow(dead_code)]
impl MockLogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-creates a stream with the given token.
    pub fn with_stream(self, group: &str, stream: &str, token: Option<&str>) -> Self {
        self.state.lock().unwrap().streams.insert(
            (group.to_string(), stream.to_string()),
            StoredStream {
                token: token.map(str::to_string),
                events: Vec::new(),
            },
        );
        self
    }

    pub fn fail_puts_for(self, stream: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_puts
            .insert(stream.to_string());
        self
    }

    pub fn hide_from_describe(self, stream: &str) -> Self {
        self.state.lock().unwrap().hidden.insert(stream.to_string());
        self
    }

    /// Simulates another writer appending to the stream.
    pub fn rotate_token(&self, group: &str, stream: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_token += 1;
        let token = format!("external-{}", state.next_token);
        if let Some(stored) = state
            .streams
            .get_mut(&(group.to_string(), stream.to_string()))
        {
            stored.token = Some(token);
        }
    }

    pub fn stream(&self, group: &str, stream: &str) -> Option<StoredStream> {
        self.state
            .lock()
            .unwrap()
            .streams
            .get(&(group.to_string(), stream.to_string()))
            .cloned()
    }

    pub fn describes(&self) -> usize {
        self.state.lock().unwrap().describes
    }

    pub fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    /// `(stream, event count)` for every append that reached the service.
    pub fn puts(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().puts.clone()
    }
}

#[async_trait]
impl LogStreamClient for MockLogService {
    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescriptor>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.describes += 1;
        let mut streams: Vec<StreamDescriptor> = state
            .streams
            .iter()
            .filter(|((g, s), _)| g == group && s.starts_with(prefix))
            .filter(|((_, s), _)| !state.hidden.contains(s))
            .map(|((_, s), stored)| StreamDescriptor {
                name: s.clone(),
                upload_sequence_token: stored.token.clone(),
            })
            .collect();
        streams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(streams)
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        let key = (group.to_string(), stream.to_string());
        if state.streams.contains_key(&key) || state.hidden.contains(stream) {
            return Err(ClientError::AlreadyExists(format!("{group}:{stream}")));
        }
        state.streams.insert(key, StoredStream::default());
        Ok(())
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        token: Option<&str>,
        events: &[Event],
    ) -> Result<PutOutcome, ClientError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if state.failing_puts.contains(stream) {
            return Err(ClientError::Service {
                status: 500,
                code: "ServiceUnavailableException".to_string(),
                message: "try again".to_string(),
            });
        }

        state.next_token += 1;
        let next = format!("token-{}", state.next_token);
        let Some(stored) = state
            .streams
            .get_mut(&(group.to_string(), stream.to_string()))
        else {
            return Err(ClientError::Service {
                status: 400,
                code: "ResourceNotFoundException".to_string(),
                message: format!("{group}:{stream} does not exist"),
            });
        };

        if stored.token.as_deref() != token {
            return Err(ClientError::InvalidSequenceToken {
                expected: stored.token.clone(),
            });
        }

        stored.token = Some(next.clone());
        stored.events.extend(
            events
                .iter()
                .map(|e| (e.message().to_string(), e.timestamp())),
        );
        state.puts.push((stream.to_string(), events.len()));

        Ok(PutOutcome {
            next_sequence_token: Some(next),
            rejected: None,
        })
    }
}
