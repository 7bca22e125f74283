//! `shop.orders` and `shop.order_item`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;

use modesta_core::{
    Address, CurrencyCode, CustomerId, OrderId, OrderItemId, OrderStatus, Price, ProductId,
};

use super::{PgStore, RepositoryError, limit_offset};
use crate::models::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, Page, PaymentOutcome, ShippingInfo,
};
use crate::store::OrderStore;

const ORDER_COLUMNS: &str = "id, customer_id, payment_session_id, payment_intent_id, status, \
     total, currency, shipping_address, billing_address, carrier, tracking_number, shipped_at, \
     estimated_delivery, shipping_notes, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    payment_session_id: Option<String>,
    payment_intent_id: Option<String>,
    status: OrderStatus,
    total: Decimal,
    currency: String,
    shipping_address: Option<Json<Address>>,
    billing_address: Option<Json<Address>>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    estimated_delivery: Option<NaiveDate>,
    shipping_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency: CurrencyCode = row.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            payment_session_id: row.payment_session_id,
            payment_intent_id: row.payment_intent_id,
            status: row.status,
            total: Price::new(row.total, currency),
            shipping_address: row.shipping_address.map(|Json(a)| a),
            billing_address: row.billing_address.map(|Json(a)| a),
            shipping: ShippingInfo {
                carrier: row.carrier,
                tracking_number: row.tracking_number,
                shipped_at: row.shipped_at,
                estimated_delivery: row.estimated_delivery,
                notes: row.shipping_notes,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: Option<i64>,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "order item {} has quantity {}",
                    row.id, row.quantity
                ))
            })?;

        Ok(Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity,
        })
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.orders (customer_id, status, total, currency, shipping_address, billing_address)
            VALUES ($1, 'pending', $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.customer_id)
        .bind(order.total.amount)
        .bind(order.total.currency_code.code())
        .bind(order.shipping_address.as_ref().map(Json))
        .bind(order.billing_address.as_ref().map(Json))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn set_payment_session(
        &self,
        id: OrderId,
        session_id: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET payment_session_id = $2, updated_at = NOW()
            WHERE id = $1 AND (payment_session_id IS NULL OR payment_session_id = $2)
            ",
        )
        .bind(id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "payment session belongs to another order"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_items(
        &self,
        id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(items.len());

        for item in items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::Conflict(format!("quantity {} out of range", item.quantity))
            })?;
            let row = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO shop.order_item (order_id, product_id, product_name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, order_id, product_id, product_name, unit_price, quantity
                ",
            )
            .bind(id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row.try_into()?);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE payment_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, product_name, unit_price, quantity
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_payment(
        &self,
        session_id: &str,
        expected: OrderStatus,
        to: OrderStatus,
        outcome: &PaymentOutcome,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET status = $3,
                payment_intent_id = COALESCE($4, payment_intent_id),
                shipping_address = COALESCE($5, shipping_address),
                billing_address = COALESCE($6, billing_address),
                updated_at = NOW()
            WHERE payment_session_id = $1 AND status = $2
            ",
        )
        .bind(session_id)
        .bind(expected)
        .bind(to)
        .bind(outcome.payment_intent_id.as_deref())
        .bind(outcome.shipping_address.as_ref().map(Json))
        .bind(outcome.billing_address.as_ref().map(Json))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_shipping(
        &self,
        id: OrderId,
        shipping: &ShippingInfo,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shop.orders
            SET carrier = $2, tracking_number = $3, shipped_at = $4,
                estimated_delivery = $5, shipping_notes = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(shipping.carrier.as_deref())
        .bind(shipping.tracking_number.as_deref())
        .bind(shipping.shipped_at)
        .bind(shipping.estimated_delivery)
        .bind(shipping.notes.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: OrderFilter, page: Page) -> Result<Vec<Order>, RepositoryError> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.orders
            WHERE ($1::shop.order_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, filter: OrderFilter) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.orders WHERE ($1::shop.order_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;

        u64::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative order count {count}")))
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM shop.orders
            WHERE customer_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn cancel_orphans(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET status = 'cancelled', updated_at = NOW()
            WHERE status = 'pending' AND payment_session_id IS NULL AND created_at < $1
            ",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn fulfilled_orders_containing(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r"
            SELECT DISTINCT o.id
            FROM shop.orders o
            JOIN shop.order_item i ON i.order_id = o.id
            WHERE o.customer_id = $1 AND i.product_id = $2 AND o.status = 'fulfilled'
            ORDER BY o.id
            ",
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(OrderId::new).collect())
    }
}
