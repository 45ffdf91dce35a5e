// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

/// One encoded telemetry unit ready for bulk submission: an opaque JSON
/// document plus the index it is routed to. Producing the document from a
/// domain event is the encoder's job, upstream of this crate.
#[derive(Clone, Debug)]
pub struct IndexRecord {
    /// Target index the document is written to.
    pub target: String,
    /// The already-encoded document body.
    pub document: Value,
}

impl IndexRecord {
    pub fn new(target: impl Into<String>, document: Value) -> Self {
        IndexRecord {
            target: target.into(),
            document,
        }
    }
}
