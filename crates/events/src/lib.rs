//! Post-commit event fan-out.
//!
//! Domain crates define their own event enums and implement [`Event`]; this
//! crate only wraps them in envelopes and hands them to subscribers.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::{Event, EventEnvelope};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
