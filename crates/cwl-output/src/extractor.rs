// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::Config;
use crate::decoder::Entry;
use crate::errors::ExtractError;
use crate::event::{Destination, Event};
use crate::record::Record;

/// Pulls the message, group and stream fields out of decoded records.
#[derive(Debug, Clone)]
pub struct Extractor {
    message_key: String,
    group_key: String,
    stream_key: String,
}

impl Extractor {
    #[must_use]
    pub fn new(
        message_key: impl Into<String>,
        group_key: impl Into<String>,
        stream_key: impl Into<String>,
    ) -> Self {
        Extractor {
            message_key: message_key.into(),
            group_key: group_key.into(),
            stream_key: stream_key.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.message_key.as_str(),
            config.log_group_name_key.as_str(),
            config.log_stream_name_key.as_str(),
        )
    }

    /// Maps one `(time, record)` entry to its destination and event.
    pub fn extract(&self, entry: &Entry) -> Result<(Destination, Event), ExtractError> {
        let record = &entry.record;
        let message = text_field(record, &self.message_key)?;
        let group = non_empty(text_field(record, &self.group_key)?, &self.group_key)?;
        let stream = non_empty(text_field(record, &self.stream_key)?, &self.stream_key)?;

        Ok((
            Destination::new(group, stream),
            Event::new(message, entry.timestamp_millis()),
        ))
    }
}

fn text_field<'a>(record: &'a Record, key: &str) -> Result<&'a str, ExtractError> {
    let value = record
        .get(key)
        .ok_or_else(|| ExtractError::FieldMissing(key.to_string()))?;
    value.as_text().ok_or_else(|| ExtractError::FieldWrongType {
        field: key.to_string(),
        found: value.kind(),
    })
}

fn non_empty<'a>(value: &'a str, key: &str) -> Result<&'a str, ExtractError> {
    if value.is_empty() {
        return Err(ExtractError::FieldEmpty(key.to_string()));
    }
    Ok(value)
}
