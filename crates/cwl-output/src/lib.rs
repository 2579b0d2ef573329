// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # CloudWatch-style log stream output
//!
//! This crate ships batches of log records handed over by a log-forwarding
//! host to a remote append-only log stream service. Every append must carry
//! the stream's current sequence token, which the service rotates after each
//! successful write and invalidates when another writer gets there first.
//!
//! ## Overview
//!
//! ```text
//!   raw batch (msgpack)
//!         │
//!         v
//!   ┌──────────────┐
//!   │   Decoder    │  [time, record] entries, lazily
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │  Extractor   │  (group, stream, event)
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │ Multiplexer  │  one StreamState per destination
//!   └──────┬───────┘
//!          v  flush
//!   ┌──────────────┐
//!   │ StreamState  │  discover / create, append with token
//!   └──────┬───────┘
//!          v
//!   ┌──────────────┐
//!   │ Log service  │
//!   └──────────────┘
//! ```
//!
//! The library is organized into:
//! - [`decoder`] and [`record`]: batch decoding and record normalization
//! - [`extractor`]: turns records into routed events
//! - [`stream`] and [`multiplexer`]: per-destination sequencing and fan-out flushes
//! - [`client`] and [`http_client`]: the remote service interface and its HTTP implementation
//! - [`plugin`] and [`ffi`]: the host-facing init / flush / exit surface

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod event;
pub mod extractor;
pub mod ffi;
pub mod http_client;
pub mod logger;
pub mod multiplexer;
pub mod plugin;
pub mod record;
pub mod stream;
