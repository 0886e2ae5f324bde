// Order/seller lookup - narrow view into the marketplace's order
// subsystem, which owns carts, orders and product lines.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::commission::FeeConfig;
use crate::error::AppResult;

/// Which seller earns a given order, and on what commission terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SellerAttribution {
    pub seller_id: Uuid,
    pub fee: FeeConfig,
}

/// Outcome of attributing an order to a seller
#[derive(Debug, Clone, PartialEq)]
pub enum SellerResolution {
    Attributed(SellerAttribution),
    /// No order exists for the given identifier
    OrderNotFound,
    /// The order exists but carries no seller-attributed product line
    NoSellerLine,
}

#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn resolve_seller(&self, order_id: i64) -> AppResult<SellerResolution>;
}

/// Order directory backed by the marketplace's Postgres schema
pub struct PgOrderDirectory {
    pool: PgPool,
    default_fee: FeeConfig,
}

impl PgOrderDirectory {
    pub fn new(pool: PgPool, default_fee: FeeConfig) -> Self {
        Self { pool, default_fee }
    }
}

#[async_trait]
impl OrderDirectory for PgOrderDirectory {
    async fn resolve_seller(&self, order_id: i64) -> AppResult<SellerResolution> {
        let order_exists = sqlx::query("SELECT 1 FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if !order_exists {
            return Ok(SellerResolution::OrderNotFound);
        }

        let row = sqlx::query(
            r#"
            SELECT s.id AS seller_id, s.fee_rate
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            JOIN sellers s ON s.id = p.seller_id
            WHERE oi.order_id = $1
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(SellerResolution::NoSellerLine);
        };

        let seller_id: Uuid = row.try_get("seller_id")?;
        let fee_rate: Option<f64> = row.try_get("fee_rate")?;
        let fee = match fee_rate {
            Some(rate) => FeeConfig::new(rate)?,
            None => self.default_fee,
        };

        Ok(SellerResolution::Attributed(SellerAttribution {
            seller_id,
            fee,
        }))
    }
}

/// In-memory order directory for tests and local development
pub struct MemoryOrderDirectory {
    orders: tokio::sync::RwLock<HashMap<i64, SellerResolution>>,
}

impl MemoryOrderDirectory {
    pub fn new() -> Self {
        Self {
            orders: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert_order(&self, order_id: i64, seller_id: Uuid, fee: FeeConfig) {
        self.orders.write().await.insert(
            order_id,
            SellerResolution::Attributed(SellerAttribution { seller_id, fee }),
        );
    }

    /// An order that exists but has no seller-attributed product line
    pub async fn insert_unattributed_order(&self, order_id: i64) {
        self.orders
            .write()
            .await
            .insert(order_id, SellerResolution::NoSellerLine);
    }
}

impl Default for MemoryOrderDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderDirectory for MemoryOrderDirectory {
    async fn resolve_seller(&self, order_id: i64) -> AppResult<SellerResolution> {
        let orders = self.orders.read().await;
        Ok(orders
            .get(&order_id)
            .cloned()
            .unwrap_or(SellerResolution::OrderNotFound))
    }
}
