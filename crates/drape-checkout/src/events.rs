//! # Checkout Events
//!
//! Typed notifications for the storefront (cart badge, confirmation page).
//!
//! ## Fan-out
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartService ──► CartChanged / CartCleared ─┐                           │
//! │                                             ▼                           │
//! │                                   broadcast::Sender ──► subscriber 1    │
//! │                                             ▲      └──► subscriber 2    │
//! │  OrderRecorder ──► OrderCompleted ──────────┘                           │
//! │                                                                         │
//! │  Publishing never blocks and never fails the checkout: no subscribers   │
//! │  is fine, and a slow subscriber lags instead of back-pressuring.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use drape_core::Money;

/// Default number of events a subscriber may fall behind before lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something the storefront may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutEvent {
    /// A shopper's cart changed; `item_count` is the new line count.
    CartChanged { user_id: String, item_count: usize },

    /// A shopper's cart was emptied.
    CartCleared { user_id: String },

    /// A paid order was recorded.
    OrderCompleted {
        order_id: String,
        user_id: String,
        payment_id: String,
        total: Money,
    },
}

/// Broadcast bus for [`CheckoutEvent`]s. Clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CheckoutEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventBus { tx }
    }

    /// Publishes an event; returns how many subscribers received it.
    pub fn publish(&self, event: CheckoutEvent) -> usize {
        trace!(?event, "Publishing checkout event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        let delivered = bus.publish(CheckoutEvent::CartCleared {
            user_id: "user-1".into(),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = CheckoutEvent::CartChanged {
            user_id: "user-1".into(),
            item_count: 2,
        };
        assert_eq!(bus.publish(event.clone()), 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(CheckoutEvent::OrderCompleted {
            order_id: "o-1".into(),
            user_id: "user-1".into(),
            payment_id: "pi_1".into(),
            total: Money::from_cents(11250),
        })
        .unwrap();

        assert_eq!(json["type"], "order_completed");
        assert_eq!(json["total"], 11250);
    }
}
