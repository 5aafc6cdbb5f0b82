//! Bounded priority send queue and its sender loop.
//!
//! Packets are ordered by priority class and then by enqueue order. One
//! sender loop per stream drains the queue into the sinks so that packet
//! arrival never waits on socket writes.

use logging::Logger;
use network::traits::PacketSink;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Priority classes, lower is sent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SendPriority {
    VideoRtx,
    Retransmit,
    Rtcp,
    Audio,
    Remb,
    Default,
}

impl SendPriority {
    pub fn value(self) -> u8 {
        match self {
            SendPriority::VideoRtx => 2,
            SendPriority::Retransmit => 5,
            SendPriority::Rtcp => 5,
            SendPriority::Audio => 6,
            SendPriority::Remb => 8,
            SendPriority::Default => 10,
        }
    }
}

/// Which peer a queued packet goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Toward the viewer: relayed media, retransmissions, SR
    Downstream,
    /// Toward the publisher: RR, NACK, key-frame requests
    Upstream,
}

/// A packet waiting to be written
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub route: Route,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: BTreeMap<(u8, u64), Outgoing>,
    next_order: u64,
}

/// Sinks the sender loop writes into
#[derive(Clone)]
pub struct RouteSinks {
    pub downstream: Arc<dyn PacketSink>,
    pub upstream: Arc<dyn PacketSink>,
}

impl RouteSinks {
    /// Same sink for both routes
    pub fn single(sink: Arc<dyn PacketSink>) -> Self {
        Self {
            downstream: sink.clone(),
            upstream: sink,
        }
    }

    fn sink_for(&self, route: Route) -> &Arc<dyn PacketSink> {
        match route {
            Route::Downstream => &self.downstream,
            Route::Upstream => &self.upstream,
        }
    }
}

/// Bounded priority queue
pub struct SendQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
    sent: AtomicU64,
    write_errors: AtomicU64,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: capacity.max(1),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    /// Enqueues a packet. When full, the packet displaces the worst queued
    /// entry if its class is better; otherwise it is dropped.
    pub fn push(&self, priority: SendPriority, route: Route, bytes: Vec<u8>) -> bool {
        let class = priority.value();
        {
            let mut state = self.state.lock();
            if state.entries.len() >= self.capacity {
                let worst = state.entries.last_key_value().map(|(key, _)| *key);
                match worst {
                    Some(key) if key.0 > class => {
                        state.entries.remove(&key);
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return false;
                    }
                }
            }

            let order = state.next_order;
            state.next_order += 1;
            state.entries.insert((class, order), Outgoing { route, bytes });
        }
        self.notify.notify_one();
        true
    }

    /// Best queued packet
    pub fn pop(&self) -> Option<Outgoing> {
        self.state.lock().entries.pop_first().map(|(_, outgoing)| outgoing)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Writes everything queued, stopping early when `cancel` fires.
    pub fn drain_into(&self, sinks: &RouteSinks, cancel: Option<&CancellationToken>) -> usize {
        let mut written = 0;
        while let Some(outgoing) = self.pop() {
            match sinks.sink_for(outgoing.route).write(&outgoing.bytes) {
                Ok(_) => {
                    self.sent.fetch_add(1, Ordering::Relaxed);
                    written += 1;
                }
                Err(_) => {
                    self.write_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            if cancel.is_some_and(|token| token.is_cancelled()) {
                break;
            }
        }
        written
    }

    /// Waits until something is pushed.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Drains `queue` into `sinks` until `cancel` fires.
pub async fn run_sender_loop(
    queue: Arc<SendQueue>,
    sinks: RouteSinks,
    cancel: CancellationToken,
    logger: Logger,
) {
    logger.info("Sender loop started");
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = queue.notified() => {
                let errors_before = queue.write_errors();
                queue.drain_into(&sinks, Some(&cancel));
                let errors = queue.write_errors() - errors_before;
                if errors > 0 {
                    logger.debug(&format!("{} packets failed to send", errors));
                }
            }
        }
    }
    logger.info(&format!(
        "Sender loop stopped (sent: {}, dropped: {}, pending: {})",
        queue.sent(),
        queue.dropped(),
        queue.len()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<Vec<u8>>>,
    }

    impl PacketSink for RecordingSink {
        fn write(&self, bytes: &[u8]) -> network::Result<usize> {
            self.writes.lock().push(bytes.to_vec());
            Ok(bytes.len())
        }
    }

    fn firsts(queue: &SendQueue) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(outgoing) = queue.pop() {
            out.push(outgoing.bytes[0]);
        }
        out
    }

    #[test]
    fn test_priority_then_fifo() {
        let queue = SendQueue::new(16);
        queue.push(SendPriority::Default, Route::Downstream, vec![1]);
        queue.push(SendPriority::Audio, Route::Downstream, vec![2]);
        queue.push(SendPriority::Default, Route::Downstream, vec![3]);
        queue.push(SendPriority::Retransmit, Route::Downstream, vec![4]);
        queue.push(SendPriority::Rtcp, Route::Upstream, vec![5]);
        queue.push(SendPriority::VideoRtx, Route::Downstream, vec![6]);

        assert_eq!(firsts(&queue), vec![6, 4, 5, 2, 1, 3]);
    }

    #[test]
    fn test_full_queue_displaces_worse_entry() {
        let queue = SendQueue::new(2);
        assert!(queue.push(SendPriority::Default, Route::Downstream, vec![1]));
        assert!(queue.push(SendPriority::Default, Route::Downstream, vec![2]));

        assert!(queue.push(SendPriority::Audio, Route::Downstream, vec![3]));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(firsts(&queue), vec![3, 1]);
    }

    #[test]
    fn test_full_queue_drops_equal_priority() {
        let queue = SendQueue::new(1);
        queue.push(SendPriority::Audio, Route::Downstream, vec![1]);

        assert!(!queue.push(SendPriority::Audio, Route::Downstream, vec![2]));
        assert!(!queue.push(SendPriority::Default, Route::Downstream, vec![3]));
        assert_eq!(queue.dropped(), 2);
        assert_eq!(firsts(&queue), vec![1]);
    }

    #[test]
    fn test_drain_routes_to_sinks() {
        let downstream = Arc::new(RecordingSink::default());
        let upstream = Arc::new(RecordingSink::default());
        let sinks = RouteSinks {
            downstream: downstream.clone(),
            upstream: upstream.clone(),
        };

        let queue = SendQueue::new(8);
        queue.push(SendPriority::Default, Route::Downstream, vec![1]);
        queue.push(SendPriority::Rtcp, Route::Upstream, vec![2]);

        assert_eq!(queue.drain_into(&sinks, None), 2);
        assert_eq!(*downstream.writes.lock(), vec![vec![1]]);
        assert_eq!(*upstream.writes.lock(), vec![vec![2]]);
        assert_eq!(queue.sent(), 2);
    }

    #[tokio::test]
    async fn test_sender_loop_drains_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path().join("send.log"), logging::LogLevel::Debug).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let queue = Arc::new(SendQueue::new(8));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_sender_loop(
            queue.clone(),
            RouteSinks::single(sink.clone()),
            cancel.clone(),
            logger,
        ));

        queue.push(SendPriority::Audio, Route::Downstream, vec![7]);
        for _ in 0..100 {
            if !sink.writes.lock().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(*sink.writes.lock(), vec![vec![7]]);
    }
}
