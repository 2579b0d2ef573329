// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// A single log line bound for a stream.
///
/// Events are never reordered locally: the order in which they are routed is
/// the order in which they are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    message: String,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
}

impl Event {
    /// Negative timestamps clamp to 0.
    #[must_use]
    pub fn new(message: impl Into<String>, timestamp: i64) -> Self {
        Event {
            message: message.into(),
            timestamp: timestamp.max(0),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Identifies one sequenced append target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Destination {
    group: String,
    stream: String,
}

impl Destination {
    #[must_use]
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Destination {
            group: group.into(),
            stream: stream.into(),
        }
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn stream(&self) -> &str {
        &self.stream
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_timestamp_clamps_to_zero() {
        let event = Event::new("hi", -5);
        assert_eq!(event.timestamp(), 0);
        assert_eq!(event.message(), "hi");
    }

    #[test]
    fn test_destination_display() {
        let destination = Destination::new("app", "web-1");
        assert_eq!(destination.to_string(), "app:web-1");
    }

    #[test]
    fn test_destination_key_is_composite() {
        // "a:b" + "c" must not collide with "a" + "b:c"
        let first = Destination::new("a:b", "c");
        let second = Destination::new("a", "b:c");
        assert_ne!(first, second);
    }
}
