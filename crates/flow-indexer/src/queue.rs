// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::record::IndexRecord;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Bounded FIFO buffer between the ingest facade and the publisher worker.
///
/// Producers insert concurrently with `try_push`, which never blocks: a full
/// queue rejects the record instead. The single worker drains it with
/// `pop_batch`, sleeping on a [`Notify`] rather than polling when the queue is
/// empty.
pub struct EventQueue {
    inner: Mutex<VecDeque<IndexRecord>>,
    capacity: usize,
    notify: Notify,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        EventQueue {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a record, returning whether it was accepted. Rejects when the
    /// queue is at capacity; never blocks and never evicts queued records.
    pub fn try_push(&self, record: IndexRecord) -> bool {
        {
            #[allow(clippy::expect_used)]
            let mut queue = self.inner.lock().expect("lock poisoned");
            if queue.len() >= self.capacity {
                return false;
            }
            queue.push_back(record);
        }
        self.notify.notify_one();
        true
    }

    /// Removes and returns up to `max_count` records. When the queue is empty,
    /// waits up to `max_wait` for the first record to arrive and returns an
    /// empty batch on timeout. Intended for a single consumer.
    pub async fn pop_batch(&self, max_count: usize, max_wait: Duration) -> Vec<IndexRecord> {
        if max_count == 0 {
            return Vec::new();
        }
        let deadline = Instant::now() + max_wait;
        loop {
            // Register for a wakeup before checking emptiness so a push
            // between the check and the await is not lost.
            let notified = self.notify.notified();
            {
                #[allow(clippy::expect_used)]
                let mut queue = self.inner.lock().expect("lock poisoned");
                if !queue.is_empty() {
                    let n = max_count.min(queue.len());
                    return queue.drain(..n).collect();
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Vec::new();
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Vec::new();
            }
        }
    }

    /// Current occupancy. May be momentarily stale relative to concurrent
    /// pushes and pops.
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        let queue = self.inner.lock().expect("lock poisoned");
        queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
