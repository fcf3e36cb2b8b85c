//! Batch accumulation: drains the event queue and dispatches bounded batches

use crate::errors::Result;
use crate::event::Event;
use crate::queue::{EventReceiver, TryDequeue};
use crate::transport::BatchSink;
use tracing::{debug, instrument};

/// Single consumer of the event queue.
///
/// A batch is dispatched when it reaches `batch_limit` events, or as soon as the
/// queue runs dry with events pending. With nothing pending the batcher parks on
/// the queue instead of spinning.
pub struct Batcher<S> {
    receiver: EventReceiver,
    sink: S,
    batch_limit: usize,
    pending: Vec<Event>,
}

impl<S: BatchSink> Batcher<S> {
    pub fn new(receiver: EventReceiver, sink: S, batch_limit: usize) -> Self {
        let batch_limit = batch_limit.max(1);
        Self {
            receiver,
            sink,
            batch_limit,
            pending: Vec::with_capacity(batch_limit),
        }
    }

    /// Run until the queue closes or a dispatch fails.
    ///
    /// Returns `Ok` once every producer is gone and all queued events were sent.
    #[instrument(skip(self), fields(batch_limit = self.batch_limit))]
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.receiver.try_dequeue() {
                TryDequeue::Ready(event) => self.push(event).await?,
                TryDequeue::Empty if !self.pending.is_empty() => self.dispatch().await?,
                TryDequeue::Empty => match self.receiver.dequeue().await {
                    Some(event) => self.push(event).await?,
                    None => break,
                },
                TryDequeue::Closed => break,
            }
        }

        if !self.pending.is_empty() {
            self.dispatch().await?;
        }

        debug!("Event queue closed, batcher stopping");
        Ok(())
    }

    /// Add an event, dispatching once the batch is full
    async fn push(&mut self, event: Event) -> Result<()> {
        self.pending.push(event);
        if self.pending.len() >= self.batch_limit {
            self.dispatch().await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self) -> Result<()> {
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_limit));
        debug!(
            "Dispatching batch of {} events, {} still queued",
            batch.len(),
            self.receiver.len()
        );
        self.sink.send_batch(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ShipperError;
    use crate::queue::event_queue;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio::time::{Duration, timeout};

    fn event(line: &str) -> Event {
        Event::new(line.to_string(), HashMap::new())
    }

    /// Records every batch and reports it on a channel
    #[derive(Clone)]
    struct RecordingSink {
        batches: Arc<Mutex<Vec<Vec<String>>>>,
        notify: mpsc::UnboundedSender<usize>,
    }

    impl RecordingSink {
        fn new() -> (Self, mpsc::UnboundedReceiver<usize>) {
            let (notify, rx) = mpsc::unbounded_channel();
            let sink = Self {
                batches: Arc::new(Mutex::new(Vec::new())),
                notify,
            };
            (sink, rx)
        }

        fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn send_batch(&self, events: Vec<Event>) -> Result<()> {
            let lines: Vec<String> = events.into_iter().map(|e| e.raw_string).collect();
            let len = lines.len();
            self.batches.lock().unwrap().push(lines);
            let _ = self.notify.send(len);
            Ok(())
        }
    }

    struct FailingSink {
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl BatchSink for FailingSink {
        async fn send_batch(&self, _events: Vec<Event>) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            Err(ShipperError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_idle_queue_flushes_partial_batch() {
        let (tx, rx) = event_queue(500);
        let (sink, mut sent) = RecordingSink::new();

        for line in ["a", "b", "c"] {
            tx.enqueue(event(line)).await.unwrap();
        }

        let handle = tokio::spawn(Batcher::new(rx, sink.clone(), 500).run());

        let size = timeout(Duration::from_secs(5), sent.recv()).await.unwrap();
        assert_eq!(size, Some(3));
        assert_eq!(sink.batches(), vec![vec!["a", "b", "c"]]);

        // Parked on an empty queue, a later event forms its own batch
        tx.enqueue(event("d")).await.unwrap();
        let size = timeout(Duration::from_secs(5), sent.recv()).await.unwrap();
        assert_eq!(size, Some(1));

        drop(tx);
        handle.await.unwrap().unwrap();
        assert_eq!(sink.batches(), vec![vec!["a", "b", "c"], vec!["d"]]);
    }

    #[tokio::test]
    async fn test_burst_is_split_at_batch_limit() {
        let (tx, rx) = event_queue(501);
        let (sink, _sent) = RecordingSink::new();

        for i in 0..501 {
            tx.enqueue(event(&i.to_string())).await.unwrap();
        }
        drop(tx);

        Batcher::new(rx, sink.clone(), 500).run().await.unwrap();

        let batches = sink.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 500);
        assert_eq!(batches[1], vec!["500"]);
    }

    #[tokio::test]
    async fn test_batches_partition_events_in_order() {
        let (tx, rx) = event_queue(64);
        let (sink, _sent) = RecordingSink::new();
        let limit = 7;

        let producer = tokio::spawn(async move {
            for i in 0..100 {
                tx.enqueue(event(&i.to_string())).await.unwrap();
            }
        });

        Batcher::new(rx, sink.clone(), limit).run().await.unwrap();
        producer.await.unwrap();

        let batches = sink.batches();
        assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= limit));

        let flattened: Vec<String> = batches.into_iter().flatten().collect();
        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(flattened, expected);
    }

    #[tokio::test]
    async fn test_limit_of_one_never_overshoots() {
        let (tx, rx) = event_queue(8);
        let (sink, _sent) = RecordingSink::new();

        for line in ["x", "y", "z"] {
            tx.enqueue(event(line)).await.unwrap();
        }
        drop(tx);

        Batcher::new(rx, sink.clone(), 1).run().await.unwrap();

        assert_eq!(sink.batches(), vec![vec!["x"], vec!["y"], vec!["z"]]);
    }

    #[tokio::test]
    async fn test_closed_empty_queue_sends_nothing() {
        let (tx, rx) = event_queue(8);
        let (sink, _sent) = RecordingSink::new();
        drop(tx);

        Batcher::new(rx, sink.clone(), 500).run().await.unwrap();

        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_stops_batcher() {
        let (tx, rx) = event_queue(600);
        let calls = Arc::new(Mutex::new(0));

        for i in 0..600 {
            tx.enqueue(event(&i.to_string())).await.unwrap();
        }

        let sink = FailingSink {
            calls: Arc::clone(&calls),
        };
        let result = Batcher::new(rx, sink, 500).run().await;

        assert!(matches!(result, Err(ShipperError::Rejected { status: 503, .. })));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
