//! `plantcare-events`
//!
//! Broker-facing message types plus a transport-agnostic publish/subscribe
//! abstraction. The in-memory bus is what the rest of the workspace talks to;
//! real transports (MQTT) are bridged onto it in `plantcare-infra`.

pub mod bus;
pub mod in_memory_bus;
pub mod message;
pub mod topic;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use message::{BrokerMessage, MessageId};
