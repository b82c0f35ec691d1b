//! # Cart Repository
//!
//! Saved carts, one per shopper. A save replaces every line in one
//! transaction, so a reader sees either the old cart or the new one.
//!
//! The cart revision is stored as a SQLite INTEGER; the bit pattern of the
//! `u64` round-trips through `i64`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::{into_items, LineRow};
use crate::error::DbResult;
use drape_core::Cart;

/// Repository for saved carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Loads a shopper's cart. `None` if they never saved one.
    pub async fn load(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let header: Option<(i64, DateTime<Utc>)> =
            sqlx::query_as("SELECT revision, updated_at FROM carts WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((revision, updated_at)) = header else {
            return Ok(None);
        };

        let rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT item_id, name, price_per_day, rental_days, size
            FROM cart_items
            WHERE user_id = ?1
            ORDER BY position
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Cart::from_items(
            into_items(rows)?,
            revision as u64,
            updated_at,
        )))
    }

    /// Replaces the shopper's saved cart with `cart`.
    pub async fn save(&self, user_id: &str, cart: &Cart) -> DbResult<()> {
        debug!(user_id = %user_id, items = cart.item_count(), "Saving cart");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO carts (user_id, revision, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id) DO UPDATE SET
                revision = excluded.revision,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(cart.revision() as i64)
        .bind(cart.updated_at())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (
                    user_id, position, item_id, name, price_per_day, rental_days, size
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(user_id)
            .bind(position as i64)
            .bind(&item.item_id)
            .bind(&item.name)
            .bind(item.price_per_day.to_string())
            .bind(item.rental_days)
            .bind(&item.size)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Empties the shopper's saved cart. A no-op if they have none.
    pub async fn clear(&self, user_id: &str) -> DbResult<()> {
        debug!(user_id = %user_id, "Clearing cart");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE carts SET revision = revision + 1, updated_at = ?2 WHERE user_id = ?1",
        )
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use drape_core::CartLineItem;
    use rust_decimal::Decimal;

    async fn repo() -> CartRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().carts()
    }

    fn cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_item(CartLineItem::new("dress-1", "Silk Dress", Decimal::new(4550, 2), 2).with_size("M"))
            .unwrap();
        cart.add_item(CartLineItem::new("bag-3", "Clutch", Decimal::from(12), 1))
            .unwrap();
        cart
    }

    #[tokio::test]
    async fn test_load_missing_cart() {
        assert!(repo().await.load("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_preserves_order() {
        let repo = repo().await;
        let original = cart();

        repo.save("user-1", &original).await.unwrap();
        let loaded = repo.load("user-1").await.unwrap().unwrap();

        assert_eq!(loaded.items(), original.items());
        assert_eq!(loaded.items()[0].size.as_deref(), Some("M"));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_lines() {
        let repo = repo().await;
        repo.save("user-1", &cart()).await.unwrap();

        let mut smaller = cart();
        smaller.remove_item("bag-3", None).unwrap();
        repo.save("user-1", &smaller).await.unwrap();

        let loaded = repo.load("user-1").await.unwrap().unwrap();
        assert_eq!(loaded.item_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_other_shoppers() {
        let repo = repo().await;
        repo.save("user-1", &cart()).await.unwrap();
        repo.save("user-2", &cart()).await.unwrap();

        repo.clear("user-1").await.unwrap();

        assert!(repo.load("user-1").await.unwrap().unwrap().is_empty());
        assert_eq!(repo.load("user-2").await.unwrap().unwrap().item_count(), 2);

        // Clearing a shopper with no cart is fine
        repo.clear("user-3").await.unwrap();
    }

    #[tokio::test]
    async fn test_revision_survives_save_and_advances_on_clear() {
        let repo = repo().await;
        let original = cart();
        repo.save("user-1", &original).await.unwrap();

        let loaded = repo.load("user-1").await.unwrap().unwrap();
        assert_eq!(loaded.revision(), original.revision());

        repo.clear("user-1").await.unwrap();
        let cleared = repo.load("user-1").await.unwrap().unwrap();
        assert_eq!(cleared.revision(), original.revision() + 1);

        // Refilling with identical lines still lands on a new revision
        let mut refilled = cleared;
        for item in original.items() {
            refilled.add_item(item.clone()).unwrap();
        }
        repo.save("user-1", &refilled).await.unwrap();

        let reloaded = repo.load("user-1").await.unwrap().unwrap();
        assert_eq!(reloaded.items(), original.items());
        assert_ne!(reloaded.revision(), original.revision());
    }
}
