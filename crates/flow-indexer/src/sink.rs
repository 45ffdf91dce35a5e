// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::Config;
use crate::record::IndexRecord;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not be reached at the transport level.
    #[error("sink unreachable: {0}")]
    Unreachable(String),
    /// The sink answered the bulk request with a non-success status. The sink
    /// is reachable; the batch is lost but connectivity is intact.
    #[error("sink rejected bulk request: {0}: {1}")]
    Rejected(StatusCode, String),
    /// The batch could not be encoded into a bulk payload.
    #[error("failed to encode bulk payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A record the sink rejected inside an otherwise delivered batch.
#[derive(Debug)]
pub struct ItemFailure {
    pub target: String,
    pub status: u16,
    pub reason: String,
}

/// Outcome of a delivered bulk write.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub failures: Vec<ItemFailure>,
}

/// The remote indexing service, reduced to the two operations the publisher
/// worker needs: a bulk write and a liveness probe.
#[async_trait]
pub trait BulkSink {
    /// Writes the batch in a single bulk operation. `Ok` means the transport
    /// round-trip succeeded; individual records may still have been rejected
    /// and are reported in the [`BulkReport`].
    async fn bulk(&self, batch: &[IndexRecord]) -> Result<BulkReport, SinkError>;

    /// Lightweight reachability probe.
    async fn ping(&self) -> bool;
}

// Lets a shared sink be handed to the pipeline without a wrapper type.
#[async_trait]
impl<S: BulkSink + Send + Sync + ?Sized> BulkSink for std::sync::Arc<S> {
    async fn bulk(&self, batch: &[IndexRecord]) -> Result<BulkReport, SinkError> {
        self.as_ref().bulk(batch).await
    }

    async fn ping(&self) -> bool {
        self.as_ref().ping().await
    }
}

/// HTTP client for an Elasticsearch-style `_bulk` endpoint.
pub struct HttpBulkSink {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpBulkSink {
    pub fn new(config: &Config) -> Self {
        let mut builder = reqwest::Client::builder().timeout(config.flush_timeout);
        if let Some(proxy) = config.https_proxy.as_deref() {
            match reqwest::Proxy::https(proxy) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => {
                    error!("Unable to parse proxy configuration: {e}, no proxy will be used");
                }
            }
        }
        let client = builder.build().unwrap_or_else(|e| {
            error!("Unable to build sink HTTP client: {e}, falling back to defaults");
            reqwest::Client::new()
        });
        HttpBulkSink {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.username.as_deref() {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }
}

/// Renders a batch as NDJSON action/document line pairs.
fn encode_bulk(batch: &[IndexRecord]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for record in batch {
        let action = serde_json::json!({ "index": { "_index": record.target } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&record.document)?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkItem>,
}

#[derive(Deserialize)]
struct BulkItem {
    index: Option<BulkItemStatus>,
}

#[derive(Deserialize)]
struct BulkItemStatus {
    #[serde(rename = "_index", default)]
    index: Option<String>,
    status: u16,
    error: Option<BulkItemError>,
}

#[derive(Deserialize)]
struct BulkItemError {
    #[serde(default)]
    reason: String,
}

#[async_trait]
impl BulkSink for HttpBulkSink {
    async fn bulk(&self, batch: &[IndexRecord]) -> Result<BulkReport, SinkError> {
        let body = encode_bulk(batch)?;
        let request = self
            .client
            .post(format!("{}/_bulk", self.base_url))
            .header("Content-Type", "application/x-ndjson")
            .body(body);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected(status, body));
        }

        let parsed: BulkResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                // The write went through; an unreadable response body is not
                // worth failing the batch over.
                debug!("Unparseable bulk response: {e}");
                return Ok(BulkReport::default());
            }
        };

        let mut failures = Vec::new();
        if parsed.errors {
            for item in parsed.items {
                if let Some(op) = item.index {
                    if op.status >= 300 {
                        failures.push(ItemFailure {
                            target: op.index.unwrap_or_default(),
                            status: op.status,
                            reason: op.error.map(|e| e.reason).unwrap_or_default(),
                        });
                    }
                }
            }
        }
        Ok(BulkReport { failures })
    }

    async fn ping(&self) -> bool {
        let request = self.authorize(self.client.get(&self.base_url));
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
