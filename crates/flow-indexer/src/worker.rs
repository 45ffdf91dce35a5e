// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::Config;
use crate::queue::EventQueue;
use crate::record::IndexRecord;
use crate::sink::{BulkSink, SinkError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Batch tunables, fixed when the worker starts.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub bulk_size: usize,
    pub bulk_timeout: Duration,
    pub empty_sleep: Duration,
    pub sink_down_sleep: Duration,
}

impl From<&Config> for BatchSettings {
    fn from(config: &Config) -> Self {
        BatchSettings {
            bulk_size: config.bulk_size,
            bulk_timeout: config.bulk_timeout,
            empty_sleep: config.empty_sleep,
            sink_down_sleep: config.sink_down_sleep,
        }
    }
}

/// The single background task draining the queue into bulk writes.
///
/// Bulk writes are issued strictly one at a time; the worker is the queue's
/// only consumer. On a transport failure the in-flight batch is discarded and
/// the worker parks in a probe/retry loop until the sink answers again —
/// bounded memory is preferred over delivery of the lost batch. Shutdown is
/// cooperative: the cancellation token is observed between batches and while
/// waiting, never mid-flush.
pub struct PublisherWorker {
    queue: Arc<EventQueue>,
    sink: Arc<dyn BulkSink + Send + Sync>,
    settings: BatchSettings,
    shutdown: CancellationToken,
}

impl PublisherWorker {
    pub fn new(
        queue: Arc<EventQueue>,
        sink: Arc<dyn BulkSink + Send + Sync>,
        settings: BatchSettings,
        shutdown: CancellationToken,
    ) -> Self {
        PublisherWorker {
            queue,
            sink,
            settings,
            shutdown,
        }
    }

    pub async fn run(self) {
        debug!("Publisher worker started");
        loop {
            let batch = self.collect_batch().await;
            if batch.is_empty() {
                // The queue stayed empty through the idle wait.
                if self.shutdown.is_cancelled() && self.queue.is_empty() {
                    break;
                }
                continue;
            }
            match self.sink.bulk(&batch).await {
                Ok(report) => {
                    debug!("Flushed bulk of {} records", batch.len());
                    for failure in report.failures {
                        error!(
                            "Record rejected by sink (index {}, status {}): {}",
                            failure.target, failure.status, failure.reason
                        );
                    }
                }
                Err(SinkError::Unreachable(e)) => {
                    warn!(
                        "Sink unreachable, dropping bulk of {} records: {e}",
                        batch.len()
                    );
                    if !self.wait_for_sink().await {
                        break;
                    }
                }
                Err(e) => {
                    error!("Dropping bulk of {} records: {e}", batch.len());
                }
            }
        }
        debug!("Publisher worker stopped");
    }

    /// Waits for a first record (IDLE), then tops the batch up until it is
    /// full or the bulk budget since that first record runs out
    /// (ACCUMULATING). Returns an empty batch when the queue stayed empty.
    async fn collect_batch(&self) -> Vec<IndexRecord> {
        // Once shutdown is requested there is nothing to wait for: drain
        // whatever is queued and let the caller stop when it runs dry.
        let idle_wait = if self.shutdown.is_cancelled() {
            Duration::ZERO
        } else {
            self.settings.empty_sleep
        };
        let mut batch = tokio::select! {
            batch = self.queue.pop_batch(self.settings.bulk_size, idle_wait) => batch,
            _ = self.shutdown.cancelled(), if !self.shutdown.is_cancelled() => return Vec::new(),
        };
        if batch.is_empty() {
            return batch;
        }
        let deadline = Instant::now() + self.settings.bulk_timeout;
        while batch.len() < self.settings.bulk_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let more = self
                .queue
                .pop_batch(self.settings.bulk_size - batch.len(), remaining)
                .await;
            if more.is_empty() {
                break;
            }
            batch.extend(more);
        }
        batch
    }

    /// Parks the worker while the sink is down, probing after every
    /// `sink_down_sleep`. No backoff growth and no retry cap: the sink being
    /// permanently misconfigured is an operator problem, not a reason to die.
    /// Returns false when shutdown was requested before the sink came back.
    async fn wait_for_sink(&self) -> bool {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.sink_down_sleep) => {}
                _ = self.shutdown.cancelled() => return false,
            }
            if self.sink.ping().await {
                info!("Sink reachable again, resuming publishing");
                return true;
            }
            debug!("Sink still unreachable");
        }
    }
}
