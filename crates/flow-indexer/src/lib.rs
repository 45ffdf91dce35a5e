// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Buffered, backpressure-aware publishing of flow telemetry to a remote
//! indexing sink.
//!
//! Producers hand encoded records to a [`Pipeline`], which buffers them in a
//! bounded in-memory queue and never blocks the caller: once the buffer is
//! full, new records are shed until the publisher catches up. A single
//! background worker drains the queue into bulk writes and rides out sink
//! outages with a probe/retry loop. Delivery is at-most-once by design — a
//! batch lost to a transport failure is not re-sent, and nothing survives a
//! restart.

pub mod backpressure;
pub mod config;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod sink;
pub mod worker;

pub use config::Config;
pub use pipeline::Pipeline;
pub use record::IndexRecord;
pub use sink::{BulkReport, BulkSink, HttpBulkSink, ItemFailure, SinkError};
