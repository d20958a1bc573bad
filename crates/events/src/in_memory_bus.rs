//! In-memory event bus.

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    #[error("bus lock poisoned")]
    Poisoned,
}

/// In-memory pub/sub bus.
///
/// - Unbounded per-subscriber queues (publish never waits)
/// - Best-effort fan-out
/// - Dead subscribers are pruned on the next publish
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions (as of the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        let before = subs.len();
        subs.retain(|tx| tx.send(message.clone()).is_ok());
        if subs.len() < before {
            debug!(pruned = before - subs.len(), "dropped closed subscriptions");
        }

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::unbounded_channel();

        // A poisoned lock still yields a subscription; it just never receives.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_gets_every_message_in_order() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        for i in 0..3 {
            bus.publish(i).unwrap();
        }

        for expected in 0..3 {
            assert_eq!(a.recv().await, Some(expected));
            assert_eq!(b.recv().await, Some(expected));
        }
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let bus: InMemoryEventBus<&'static str> = InMemoryEventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.publish("ping").unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        drop(keep);
    }
}
