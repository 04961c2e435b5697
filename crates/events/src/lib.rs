//! Transport-agnostic pub/sub used for push notifications between the
//! identity boundary and the session core.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{EventBus, RecvError, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
