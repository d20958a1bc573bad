//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes broker messages to every consumer in the process: the
//! stream handler, the MQTT relay, tests.
//!
//! - **Transport-agnostic**: in-memory channels or a broker relay
//! - **Per-subscriber ordering**: each subscriber sees messages in publish order
//! - **No persistence**: dropped subscribers simply stop receiving

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};

/// A subscription to a message stream.
///
/// Each subscription receives its own copy of every message published after it
/// was created (broadcast semantics).
///
/// ```ignore
/// let mut sub = bus.subscribe();
/// while let Some(msg) = sub.recv().await {
///     handler.handle(msg).await;
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Publish/subscribe bus.
///
/// `publish` never waits: implementations must hand the message off without
/// blocking the caller, so it is safe to call from inside async handlers.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
