//! Bounded inbound event queue.
//!
//! [`EventBus`] decouples the transport's sync loop from the dispatcher
//! with a bounded tokio MPSC channel. Replies do not travel through the
//! bus: the dispatcher talks to the transport directly so it can observe
//! send success before updating room context.

use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use ribit_types::error::RibitError;
use ribit_types::event::InboundEvent;

/// Default queue capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Bounded MPSC queue of inbound events.
pub struct EventBus {
    tx: mpsc::Sender<InboundEvent>,
    rx: Mutex<mpsc::Receiver<InboundEvent>>,
}

impl EventBus {
    /// Create a bus with the default capacity (1024).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom capacity.
    ///
    /// Lower capacity gives tighter backpressure against a bursty
    /// transport; higher capacity buffers more at the cost of memory.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        debug!(capacity, "event bus created");
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Publish an event without waiting. Errors when the queue is full
    /// or closed.
    pub fn publish(&self, event: InboundEvent) -> Result<(), RibitError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RibitError::Bus("inbound queue full (backpressure)".into())
            }
            mpsc::error::TrySendError::Closed(_) => RibitError::Bus("inbound queue closed".into()),
        })
    }

    /// Publish an event, waiting for space if the queue is full.
    ///
    /// Prefer this from async producers so bursts are not dropped.
    pub async fn publish_async(&self, event: InboundEvent) -> Result<(), RibitError> {
        self.tx
            .send(event)
            .await
            .map_err(|e| RibitError::Bus(format!("inbound queue closed: {e}")))
    }

    /// Consume the next event. `None` once the queue is closed and drained.
    pub async fn consume(&self) -> Option<InboundEvent> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Cloneable producer handle for transport tasks.
    pub fn sender(&self) -> mpsc::Sender<InboundEvent> {
        self.tx.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
