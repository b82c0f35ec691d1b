//! Cart mutations routed through a [`CartStore`], announcing each change
//! on the [`EventBus`].

use std::sync::Arc;
use tracing::debug;

use drape_core::{Cart, CartLineItem};

use crate::error::{CheckoutError, CheckoutResult};
use crate::events::{CheckoutEvent, EventBus};
use crate::stores::CartStore;

/// Load, mutate, save, publish.
///
/// Each call is a read-modify-write of one shopper's cart; concurrent calls
/// for the same shopper must be serialized by the caller.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartStore>,
    events: EventBus,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>, events: EventBus) -> Self {
        CartService { store, events }
    }

    /// The shopper's current cart.
    pub async fn get(&self, user_id: &str) -> CheckoutResult<Cart> {
        self.store
            .load(user_id)
            .await
            .map_err(CheckoutError::CartStore)
    }

    /// Adds an item, or replaces the rental length of the same item and size.
    pub async fn add_item(&self, user_id: &str, item: CartLineItem) -> CheckoutResult<Cart> {
        self.mutate(user_id, |cart| cart.add_item(item)).await
    }

    pub async fn set_rental_days(
        &self,
        user_id: &str,
        item_id: &str,
        size: Option<&str>,
        rental_days: i64,
    ) -> CheckoutResult<Cart> {
        self.mutate(user_id, |cart| {
            cart.set_rental_days(item_id, size, rental_days)
        })
        .await
    }

    pub async fn remove_item(
        &self,
        user_id: &str,
        item_id: &str,
        size: Option<&str>,
    ) -> CheckoutResult<Cart> {
        self.mutate(user_id, |cart| cart.remove_item(item_id, size))
            .await
    }

    /// Empties the cart.
    pub async fn clear(&self, user_id: &str) -> CheckoutResult<()> {
        self.store
            .clear(user_id)
            .await
            .map_err(CheckoutError::CartStore)?;

        self.events.publish(CheckoutEvent::CartCleared {
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn mutate<F>(&self, user_id: &str, change: F) -> CheckoutResult<Cart>
    where
        F: FnOnce(&mut Cart) -> Result<(), drape_core::CartError>,
    {
        let mut cart = self.get(user_id).await?;
        change(&mut cart)?;

        self.store
            .save(user_id, &cart)
            .await
            .map_err(CheckoutError::CartStore)?;

        debug!(user_id, item_count = cart.item_count(), "Cart updated");
        self.events.publish(CheckoutEvent::CartChanged {
            user_id: user_id.to_string(),
            item_count: cart.item_count(),
        });

        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryCartStore;
    use drape_core::CartError;
    use rust_decimal::Decimal;

    fn service() -> (CartService, EventBus) {
        let events = EventBus::default();
        (
            CartService::new(Arc::new(InMemoryCartStore::new()), events.clone()),
            events,
        )
    }

    fn gown() -> CartLineItem {
        CartLineItem::new("gown-7", "Velvet Gown", Decimal::new(6000, 2), 3).with_size("S")
    }

    #[tokio::test]
    async fn test_add_then_update_publishes_changes() {
        let (service, events) = service();
        let mut rx = events.subscribe();

        service.add_item("user-1", gown()).await.unwrap();
        let cart = service
            .set_rental_days("user-1", "gown-7", Some("S"), 5)
            .await
            .unwrap();

        assert_eq!(cart.items()[0].rental_days, 5);
        assert_eq!(service.get("user-1").await.unwrap(), cart);

        for _ in 0..2 {
            assert_eq!(
                rx.recv().await.unwrap(),
                CheckoutEvent::CartChanged {
                    user_id: "user-1".into(),
                    item_count: 1
                }
            );
        }
    }

    #[tokio::test]
    async fn test_rejected_change_is_not_saved() {
        let (service, events) = service();
        service.add_item("user-1", gown()).await.unwrap();
        let mut rx = events.subscribe();

        let err = service
            .set_rental_days("user-1", "gown-7", Some("S"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Cart(CartError::InvalidItem { .. })));

        let err = service
            .remove_item("user-1", "gown-7", Some("M"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Cart(CartError::ItemNotInCart { .. })));

        assert_eq!(service.get("user-1").await.unwrap().items()[0].rental_days, 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (service, events) = service();
        service.add_item("user-1", gown()).await.unwrap();
        service
            .add_item(
                "user-1",
                CartLineItem::new("coat-2", "Wool Coat", Decimal::from(30), 2),
            )
            .await
            .unwrap();

        let cart = service.remove_item("user-1", "gown-7", Some("S")).await.unwrap();
        assert_eq!(cart.item_count(), 1);

        let mut rx = events.subscribe();
        service.clear("user-1").await.unwrap();
        assert!(service.get("user-1").await.unwrap().is_empty());
        assert_eq!(
            rx.recv().await.unwrap(),
            CheckoutEvent::CartCleared {
                user_id: "user-1".into()
            }
        );
    }
}
