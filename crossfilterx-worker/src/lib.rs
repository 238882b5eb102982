//! The message-protocol boundary wrapping a `crossfilterx-engine` [`Engine`]
//! (§5 concurrency/resource model, §6 external interfaces).
//!
//! [`Worker`] is a plain, synchronous dispatcher: feed it one
//! [`InboundMessage`] at a time, get one [`OutboundMessage`] back. [`spawn`]
//! wraps it in a dedicated thread and a pair of `crossbeam-channel` queues,
//! mirroring the channel-plus-background-thread shape
//! `metrics-exporter-tcp` uses for its own event loop, so embedding code
//! that wants a background worker does not have to build the plumbing
//! itself.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, SendError, Sender};

pub use config::WorkerConfig;
pub use dispatcher::Worker;
pub use error::{WorkerError, WorkerResult};
pub use protocol::{InboundMessage, OutboundMessage};

/// A background worker thread plus the channels feeding it (§5: "any
/// queuing/idle/cancellation is the orchestrator's concern" — this struct
/// is the orchestrator-facing handle, not a new concurrency model).
pub struct WorkerHandle {
    inbound: Option<Sender<InboundMessage>>,
    outbound: Receiver<OutboundMessage>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns the worker thread. The channels are unbounded: the spec's
    /// "messages processed in arrival order" (§5) guarantee only holds if
    /// nothing is ever dropped for being full, and a single synchronous
    /// engine can't usefully apply backpressure to its own inbound queue.
    pub fn spawn(config: WorkerConfig) -> Self {
        let (inbound_tx, inbound_rx) = unbounded::<InboundMessage>();
        let (outbound_tx, outbound_rx) = unbounded::<OutboundMessage>();

        let thread = thread::Builder::new()
            .name("crossfilterx-worker".to_string())
            .spawn(move || {
                let mut worker = Worker::new(config);
                for message in inbound_rx {
                    let reply = worker.handle(message);
                    if outbound_tx.send(reply).is_err() {
                        break;
                    }
                }
            })
            .expect("failed to spawn crossfilterx worker thread");

        Self {
            inbound: Some(inbound_tx),
            outbound: outbound_rx,
            thread: Some(thread),
        }
    }

    /// Enqueues a message for the worker thread. Errors only if the worker
    /// thread has already exited (e.g. after a panic).
    pub fn send(&self, message: InboundMessage) -> Result<(), SendError<InboundMessage>> {
        self.inbound.as_ref().expect("inbound channel only taken on drop").send(message)
    }

    /// Blocks until the next reply is available.
    pub fn recv(&self) -> Option<OutboundMessage> {
        self.outbound.recv().ok()
    }

    /// Non-blocking poll for the next reply.
    pub fn try_recv(&self) -> Option<OutboundMessage> {
        self.outbound.try_recv().ok()
    }

    /// Access the outbound channel directly, for orchestrators that want to
    /// `select!` over it alongside other event sources.
    pub fn outbound(&self) -> &Receiver<OutboundMessage> {
        &self.outbound
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Drop `inbound` first to close the channel, ending the worker
        // thread's `for message in inbound_rx` loop before we join it.
        self.inbound.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{IngestRows, WireDimKind, WireDimSpec, WireRow};

    #[test]
    fn spawned_worker_round_trips_ingest_over_channels() {
        let handle = WorkerHandle::spawn(WorkerConfig::new());

        let mut row = WireRow::new();
        row.insert("value".to_string(), serde_json::json!(1.0));

        handle
            .send(InboundMessage::Ingest {
                schema: vec![WireDimSpec {
                    name: "value".to_string(),
                    kind: WireDimKind::Number,
                    bits: 4,
                    coarse_target_bins: None,
                }],
                rows: IngestRows::RowOriented(vec![row]),
                value_column_names: None,
            })
            .unwrap();

        match handle.recv() {
            Some(OutboundMessage::Ready { row_count, .. }) => assert_eq!(row_count, 1),
            other => panic!("expected READY, got {other:?}"),
        }
    }

    #[test]
    fn dropping_handle_joins_worker_thread_cleanly() {
        let handle = WorkerHandle::spawn(WorkerConfig::new());
        drop(handle);
    }
}
