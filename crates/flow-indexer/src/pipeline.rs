// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::backpressure::BackpressureMonitor;
use crate::config::Config;
use crate::queue::EventQueue;
use crate::record::IndexRecord;
use crate::sink::BulkSink;
use crate::worker::{BatchSettings, PublisherWorker};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The owned pipeline: bounded queue, backpressure monitor and publisher
/// worker bundled behind one ingest entry point. Constructed once and shared
/// by reference with every producer; there is no global state.
pub struct Pipeline {
    queue: Arc<EventQueue>,
    monitor: BackpressureMonitor,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Launches the publisher worker and returns the handle producers submit
    /// through. Must be called from within a tokio runtime.
    pub fn start<S>(config: &Config, sink: S) -> Self
    where
        S: BulkSink + Send + Sync + 'static,
    {
        let queue = Arc::new(EventQueue::new(config.buffer_size));
        let monitor = BackpressureMonitor::new(config.buffer_size);
        let shutdown = CancellationToken::new();
        let worker = PublisherWorker::new(
            Arc::clone(&queue),
            Arc::new(sink),
            BatchSettings::from(config),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());
        Pipeline {
            queue,
            monitor,
            shutdown,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Submits one record, fire-and-forget. A record may be dropped — once
    /// shutdown has been requested, or when the buffer is at capacity — and
    /// the drop is counted, never surfaced to the caller.
    pub fn submit(&self, record: IndexRecord) {
        if self.shutdown.is_cancelled() {
            self.monitor.record_drop();
            return;
        }
        if !self.monitor.admit(self.queue.len()) {
            return;
        }
        if !self.queue.try_push(record) {
            // Lost the race against other producers between the admission
            // check and the insert.
            self.monitor.record_drop();
        }
    }

    /// Signals the worker to stop and returns immediately. Records already
    /// queued are still drained (unless the sink is down); new submissions
    /// are dropped from this point on.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits until the worker has stopped. Returns immediately when it
    /// already has.
    pub async fn join(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!("Publisher worker task failed: {e}");
            }
        }
    }

    /// Current queue occupancy; momentarily stale under concurrent traffic.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Total records dropped since start.
    pub fn dropped(&self) -> u64 {
        self.monitor.dropped()
    }

    pub fn is_overloaded(&self) -> bool {
        self.monitor.is_overloaded()
    }
}
