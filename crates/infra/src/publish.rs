//! Post-commit publication of stock events.

use std::sync::atomic::{AtomicU64, Ordering};

use almox_events::{EventBus, EventEnvelope};
use almox_inventory::StockEvent;

/// Wraps stock events into envelopes and hands them to the bus.
///
/// Called only after the store accepted the commit, so a bus failure never
/// loses state; it is logged and the commit stands.
#[derive(Debug)]
pub struct StockPublisher<B> {
    bus: B,
    sequence: AtomicU64,
}

impl<B> StockPublisher<B>
where
    B: EventBus<EventEnvelope<StockEvent>>,
{
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = StockEvent>) {
        for event in events {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let envelope = EventEnvelope::wrap(event.scope().to_string(), seq, event);
            let event_type = envelope.event_type().to_string();

            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(event_type = %event_type, sequence = seq, error = ?err, "stock event publication failed");
            }
        }
    }
}
