//! Bounded in-memory queue between line readers and the batch sender

use crate::errors::{Result, ShipperError};
use crate::event::Event;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Outcome of a non-blocking dequeue
#[derive(Debug, PartialEq)]
pub enum TryDequeue {
    Ready(Event),
    Empty,
    /// Every producer is gone and nothing is left
    Closed,
}

/// Create a queue holding at most `capacity` events.
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer side. Cloneable; clones feed the same queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// Add an event, waiting for room while the queue is full
    pub async fn enqueue(&self, event: Event) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ShipperError::QueueClosed)
    }

    /// Add an event without waiting; the event is handed back if it was not taken
    pub fn try_enqueue(&self, event: Event) -> std::result::Result<(), Event> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) | TrySendError::Closed(event) => event,
        })
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer side. There is exactly one.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event; `None` once the queue is closed and drained
    pub async fn dequeue(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_dequeue(&mut self) -> TryDequeue {
        match self.rx.try_recv() {
            Ok(event) => TryDequeue::Ready(event),
            Err(TryRecvError::Empty) => TryDequeue::Empty,
            Err(TryRecvError::Disconnected) => TryDequeue::Closed,
        }
    }

    /// Number of events currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
