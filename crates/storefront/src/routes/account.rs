//! Account route handlers: a logged-in customer's own orders.

use axum::{
    Json,
    extract::{Path, State},
};

use modesta_commerce::models::{Order, OrderView};
use modesta_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::state::AppState;

/// Orders of the logged-in customer, newest first.
pub async fn orders(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Vec<Order>>> {
    let orders = state
        .commerce()
        .ledger()
        .list_for_customer(customer.id)
        .await?;
    Ok(Json(orders))
}

/// One order with its items. Other customers' orders look missing.
pub async fn order_detail(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    let view = state.commerce().ledger().view(order_id).await?;
    if view.order.customer_id != customer.id {
        return Err(AppError::NotFound(format!("order {order_id}")));
    }
    Ok(Json(view))
}
