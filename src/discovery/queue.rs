//! Discovery worker.
//!
//! Middleware threads hand notifications to a bounded channel; one dedicated
//! worker applies them in arrival order. Rejected notifications are logged and
//! counted, never returned to the producer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::{ExecutionError, GraphError, GraphResult};

use super::notification::DiscoveryNotification;

const PATH: &str = "discovery";

/// Consumer side of the queue.
pub(crate) trait NotificationSink: Send + Sync + 'static {
    fn apply(&self, notification: DiscoveryNotification) -> GraphResult<()>;
}

enum QueueMsg {
    Notify(Box<DiscoveryNotification>),
    Barrier { reply: Sender<()> },
}

fn disconnected() -> GraphError {
    ExecutionError::Disconnected {
        path: PATH.to_string(),
    }
    .into()
}

/// Bounded queue with a single consuming worker thread.
pub(crate) struct DiscoveryQueue {
    tx: Option<Sender<QueueMsg>>,
    capacity: usize,
    rejected: Arc<AtomicU64>,
    join: Option<JoinHandle<()>>,
}

impl DiscoveryQueue {
    pub(crate) fn start(config: &BackendConfig, sink: Arc<dyn NotificationSink>) -> GraphResult<Self> {
        let capacity = config.discovery_queue_capacity.max(1);
        let (tx, rx) = bounded::<QueueMsg>(capacity);
        let rejected = Arc::new(AtomicU64::new(0));

        let worker_rejected = Arc::clone(&rejected);
        let join = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || worker_loop(&*sink, &worker_rejected, &rx))
            .map_err(|e| GraphError::internal(format!("failed to spawn discovery worker: {e}")))?;

        Ok(Self {
            tx: Some(tx),
            capacity,
            rejected,
            join: Some(join),
        })
    }

    fn sender(&self) -> GraphResult<&Sender<QueueMsg>> {
        self.tx.as_ref().ok_or_else(disconnected)
    }

    /// Enqueue, blocking while the queue is full.
    pub(crate) fn submit(&self, notification: DiscoveryNotification) -> GraphResult<()> {
        self.sender()?
            .send(QueueMsg::Notify(Box::new(notification)))
            .map_err(|_| disconnected())
    }

    /// Enqueue without blocking.
    pub(crate) fn try_submit(&self, notification: DiscoveryNotification) -> GraphResult<()> {
        match self.sender()?.try_send(QueueMsg::Notify(Box::new(notification))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ExecutionError::QueueFull {
                path: PATH.to_string(),
                capacity: self.capacity,
            }
            .into()),
            Err(TrySendError::Disconnected(_)) => Err(disconnected()),
        }
    }

    /// Wait until everything submitted before this call has been applied.
    pub(crate) fn flush(&self) -> GraphResult<()> {
        let (reply, done) = bounded::<()>(1);
        self.sender()?
            .send(QueueMsg::Barrier { reply })
            .map_err(|_| disconnected())?;
        done.recv().map_err(|_| disconnected())
    }

    pub(crate) fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for DiscoveryQueue {
    fn drop(&mut self) {
        // Close the channel: the worker drains queued notifications then exits.
        drop(self.tx.take());
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(sink: &dyn NotificationSink, rejected: &AtomicU64, rx: &Receiver<QueueMsg>) {
    for msg in rx {
        match msg {
            QueueMsg::Notify(notification) => {
                let kind = notification.entity.kind();
                if let Err(error) = sink.apply(*notification) {
                    rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(%error, %kind, "discovery notification rejected");
                }
            }
            QueueMsg::Barrier { reply } => {
                let _ = reply.send(());
            }
        }
    }
    debug!("discovery worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Barrier, Mutex};

    use crate::discovery::notification::{DiscoveryStatus, TopicInfo};
    use crate::entity::EntityId;
    use crate::error::ValidationError;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl NotificationSink for Recorder {
        fn apply(&self, notification: DiscoveryNotification) -> GraphResult<()> {
            let name = notification.entity.name().to_string();
            if name.starts_with("bad") {
                return Err(ValidationError::RejectedNotification { reason: name }.into());
            }
            self.seen.lock().unwrap().push(name);
            Ok(())
        }
    }

    struct Gate {
        barrier: Barrier,
    }

    impl NotificationSink for Gate {
        fn apply(&self, _: DiscoveryNotification) -> GraphResult<()> {
            self.barrier.wait();
            Ok(())
        }
    }

    fn topic(name: &str) -> DiscoveryNotification {
        DiscoveryNotification::topic(
            EntityId::from(1),
            DiscoveryStatus::Discovered,
            TopicInfo {
                name: name.to_string(),
                data_type: "T".to_string(),
            },
        )
    }

    #[test]
    fn applies_in_order_and_counts_rejections() {
        let sink = Arc::new(Recorder::default());
        let queue = DiscoveryQueue::start(&BackendConfig::default(), sink.clone()).unwrap();
        for name in ["a", "bad", "b", "c"] {
            queue.submit(topic(name)).unwrap();
        }
        queue.flush().unwrap();
        assert_eq!(*sink.seen.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(queue.rejected(), 1);
    }

    #[test]
    fn try_submit_reports_full_queue() {
        let gate = Arc::new(Gate {
            barrier: Barrier::new(2),
        });
        let config = BackendConfig {
            discovery_queue_capacity: 1,
            ..BackendConfig::default()
        };
        let queue = DiscoveryQueue::start(&config, gate.clone()).unwrap();

        // The worker takes the first message and parks on the barrier.
        queue.submit(topic("held")).unwrap();
        let mut accepted = 1;
        let mut full = false;
        for _ in 0..1000 {
            match queue.try_submit(topic("next")) {
                Ok(()) => accepted += 1,
                Err(err) => {
                    assert!(err.is_retryable());
                    full = true;
                    break;
                }
            }
        }
        assert!(full);
        assert_eq!(queue.capacity(), 1);

        // Release exactly the applies that were queued.
        let releaser = thread::spawn(move || {
            for _ in 0..accepted {
                gate.barrier.wait();
            }
        });
        queue.flush().unwrap();
        releaser.join().unwrap();
    }

    #[test]
    fn drop_drains_pending_work() {
        let sink = Arc::new(Recorder::default());
        {
            let queue = DiscoveryQueue::start(&BackendConfig::default(), sink.clone()).unwrap();
            for i in 0..50 {
                queue.submit(topic(&format!("t{i}"))).unwrap();
            }
        }
        assert_eq!(sink.seen.lock().unwrap().len(), 50);
    }
}
