// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lazy decoding of host batches.
//!
//! A batch is a plain concatenation of MessagePack values, one per log line:
//!
//! ```text
//! [time, {record}]              classic form
//! [[time, {metadata}], {record}] form with per-record metadata
//! ```
//!
//! `time` is integer seconds, float seconds, or the event-time extension
//! (type 0: big-endian u32 seconds followed by u32 nanoseconds). Decoding stops
//! at the first malformed element; everything before it is still yielded.

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, SeqAccess, Visitor};
use std::fmt;
use std::iter::FusedIterator;

use crate::constants::EVENT_TIME_EXT_TYPE;
use crate::errors::DecodeError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryTime {
    Seconds(i64),
    Fractional(f64),
    EventTime { seconds: u32, nanoseconds: u32 },
}

impl EntryTime {
    /// Milliseconds since the epoch, saturating.
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        match *self {
            EntryTime::Seconds(seconds) => seconds.saturating_mul(1000),
            #[allow(clippy::cast_possible_truncation)]
            EntryTime::Fractional(seconds) => (seconds * 1000.0) as i64,
            EntryTime::EventTime {
                seconds,
                nanoseconds,
            } => i64::from(seconds) * 1000 + i64::from(nanoseconds / 1_000_000),
        }
    }
}

/// One decoded `(time, record)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub time: EntryTime,
    pub record: Record,
}

impl Entry {
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.time.as_millis()
    }
}

/// Iterates over the entries of a raw batch without copying it up front.
#[derive(Debug)]
pub struct BatchDecoder<'a> {
    remaining: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> BatchDecoder<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        BatchDecoder {
            remaining: data,
            offset: 0,
            failed: false,
        }
    }

    /// Bytes consumed by successfully decoded entries so far.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for BatchDecoder<'_> {
    type Item = Result<Entry, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }

        let before = self.remaining.len();
        let result = {
            let mut de = rmp_serde::Deserializer::new(&mut self.remaining);
            Entry::deserialize(&mut de)
        };

        match result {
            Ok(entry) => {
                self.offset += before - self.remaining.len();
                Some(Ok(entry))
            }
            Err(source) => {
                self.failed = true;
                Some(Err(DecodeError {
                    offset: self.offset,
                    source,
                }))
            }
        }
    }
}

impl FusedIterator for BatchDecoder<'_> {}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(EntryVisitor)
    }
}

struct EntryVisitor;

impl<'de> Visitor<'de> for EntryVisitor {
    type Value = Entry;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a [time, record] array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Entry, A::Error> {
        let time = seq
            .next_element::<EntryTime>()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let record = seq
            .next_element::<Record>()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Entry { time, record })
    }
}

impl<'de> Deserialize<'de> for EntryTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EntryTimeVisitor)
    }
}

struct EntryTimeVisitor;

impl<'de> Visitor<'de> for EntryTimeVisitor {
    type Value = EntryTime;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer, float or event-time timestamp")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntryTime, E> {
        Ok(EntryTime::Seconds(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntryTime, E> {
        Ok(EntryTime::Seconds(i64::try_from(v).unwrap_or(i64::MAX)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<EntryTime, E> {
        Ok(EntryTime::Fractional(v))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<EntryTime, D::Error> {
        let (tag, data): (i8, serde_bytes::ByteBuf) = Deserialize::deserialize(deserializer)?;
        if tag != EVENT_TIME_EXT_TYPE || data.len() != 8 {
            return Err(de::Error::invalid_value(
                de::Unexpected::Other("extension value"),
                &self,
            ));
        }
        let seconds = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let nanoseconds = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        Ok(EntryTime::EventTime {
            seconds,
            nanoseconds,
        })
    }

    // [time, metadata] header
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<EntryTime, A::Error> {
        let time = seq
            .next_element::<EntryTime>()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(time)
    }
}
