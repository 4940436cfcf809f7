// SPDX-License-Identifier: Apache-2.0 OR MIT
// A route pairs a formatter with a sink behind a bounded queue and a
// dedicated consumer thread

use crate::format::Format;
use crate::level::LogLevel;
use crate::record::Envelope;
use crate::sink::Sink;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

/// Bound of each route's inbound queue. A full queue blocks producers;
/// that is the only backpressure primitive.
pub const QUEUE_CAPACITY: usize = 1024;

/// One delivery path: formatter + sink + level threshold, fed through a
/// bounded channel drained by a dedicated consumer thread.
///
/// Every record the queue accepts is formatted and committed before the
/// consumer exits; closing the route stops intake but never drops what was
/// already accepted.
pub struct Route {
    formatter: Arc<dyn Format>,
    sink: Arc<dyn Sink>,
    threshold: LogLevel,
    /// `None` once closed. Enqueue holds the read lock across the send so a
    /// close (write lock) cannot drop the channel under an in-flight send.
    sender: RwLock<Option<Sender<Envelope>>>,
    receiver: Mutex<Option<Receiver<Envelope>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl Route {
    pub fn new(formatter: Arc<dyn Format>, sink: Arc<dyn Sink>, threshold: LogLevel) -> Self {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        Self {
            formatter,
            sink,
            threshold,
            sender: RwLock::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            consumer: Mutex::new(None),
        }
    }

    /// Whether this route admits records at `level`. Pure; no locking.
    #[inline]
    pub fn should_log(&self, level: LogLevel) -> bool {
        level >= self.threshold
    }

    /// Offer an envelope to the queue. This is the single threshold gate:
    /// envelopes below the route's level are discarded here, as are any
    /// arriving after `close`. Blocks while the queue is full.
    pub fn enqueue(&self, envelope: Envelope) {
        if !self.should_log(envelope.level()) {
            return;
        }
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(envelope);
        }
    }

    /// Spawn the consumer thread. Idempotent; the logger calls this once
    /// when it takes ownership of the route.
    pub(crate) fn start(&self) {
        let mut slot = self.consumer.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return;
        }
        let Some(rx) = self
            .receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };

        let formatter = Arc::clone(&self.formatter);
        let sink = Arc::clone(&self.sink);
        *slot = Some(std::thread::spawn(move || {
            // The iterator yields every buffered envelope even after the
            // sender is dropped, which is exactly the drain-on-close
            // contract. Formatter and sink errors are swallowed here:
            // logging about logging is out of scope.
            for envelope in rx.iter() {
                let record = envelope.into_record();
                if let Ok(bytes) = formatter.format(&record) {
                    let _ = sink.write(&bytes);
                }
            }
            let _ = sink.flush();
        }));
    }

    /// Stop intake. Idempotent. Already-queued envelopes still drain.
    pub fn close(&self) {
        let mut guard = self.sender.write().unwrap_or_else(|e| e.into_inner());
        // Dropping the only sender disconnects the channel; the consumer
        // finishes the backlog and flushes.
        *guard = None;
    }

    /// Wait for the consumer to finish its drain-and-flush.
    pub(crate) fn join(&self) {
        let handle = self
            .consumer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}
