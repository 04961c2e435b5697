//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus makes minimal assumptions:
//!
//! - **Transport-agnostic**: in-memory channels, a provider's realtime socket, etc.
//! - **Broadcast semantics**: every live subscription gets a copy of every message
//! - **Per-publisher ordering**: messages from one publisher arrive in publish order
//! - **No persistence**: a subscription only sees messages published after it was created
//!
//! Consumers must tolerate duplicates; a provider may re-announce the same
//! session (e.g. on reconnect).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// Nothing queued right now.
    #[error("no message available")]
    Empty,

    /// No message arrived within the given timeout.
    #[error("timed out waiting for a message")]
    Timeout,

    /// The bus was dropped; no more messages will arrive.
    #[error("event bus closed")]
    Closed,
}

/// A subscription to an event stream.
///
/// ```ignore
/// let mut subscription = bus.subscribe();
/// while let Some(event) = subscription.recv().await {
///     handle(event);
/// }
/// ```
///
/// Dropping the subscription unsubscribes it; the bus prunes it on the next
/// publish.
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

    /// Take a queued message without waiting.
    pub fn try_recv(&mut self) -> Result<M, RecvError> {
        self.receiver.try_recv().map_err(|err| match err {
            TryRecvError::Empty => RecvError::Empty,
            TryRecvError::Disconnected => RecvError::Closed,
        })
    }

    /// Wait up to `timeout` for the next message.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<M, RecvError> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(RecvError::Closed),
            Err(_) => Err(RecvError::Timeout),
        }
    }

    /// Stop receiving; already queued messages can still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// `publish` never blocks; implementations must be safe to share across
/// tasks.
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
