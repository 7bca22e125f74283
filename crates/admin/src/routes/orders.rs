//! Orders management route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use modesta_commerce::models::{Order, OrderFilter, OrderView, Page, ShippingInfo};
use modesta_commerce::services::OrderPage;
use modesta_core::{OrderId, OrderStatus, Transition};

use crate::error::Result;
use crate::middleware::AdminCaller;
use crate::state::AppState;

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdated {
    pub order: Order,
    /// False when the order was already in the requested status.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct SweepResult {
    pub cancelled: u64,
}

/// Orders, newest first, optionally filtered by status.
#[instrument(skip(state, caller))]
pub async fn index(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderPage>> {
    let filter = OrderFilter {
        status: query.status,
    };
    let page = Page::new(query.page, query.per_page);
    let orders = state
        .commerce()
        .back_office()
        .list_orders(&caller, filter, page)
        .await?;
    Ok(Json(orders))
}

/// One order with its items and customer.
pub async fn show(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    let view = state
        .commerce()
        .back_office()
        .order_detail(&caller, order_id)
        .await?;
    Ok(Json(view))
}

/// Move an order along the status state machine.
#[instrument(skip(state, caller, form), fields(status = %form.status))]
pub async fn set_status(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Path(order_id): Path<OrderId>,
    Json(form): Json<StatusForm>,
) -> Result<Json<StatusUpdated>> {
    let change = state
        .commerce()
        .back_office()
        .set_order_status(&caller, order_id, form.status)
        .await?;
    Ok(Json(StatusUpdated {
        changed: change.transition == Transition::Applied,
        order: change.order,
    }))
}

/// Replace carrier, tracking number and delivery notes.
pub async fn update_shipping(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Path(order_id): Path<OrderId>,
    Json(shipping): Json<ShippingInfo>,
) -> Result<Json<Order>> {
    let order = state
        .commerce()
        .back_office()
        .update_shipping(&caller, order_id, &shipping)
        .await?;
    Ok(Json(order))
}

/// Orders as a CSV download.
pub async fn export_csv(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let filter = OrderFilter {
        status: query.status,
    };
    let csv = state
        .commerce()
        .back_office()
        .export_orders_csv(&caller, filter)
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"orders.csv\"",
            ),
        ],
        csv,
    ))
}

/// Cancel stale unpaid orders that never got a payment session.
pub async fn sweep(
    State(state): State<AppState>,
    AdminCaller(caller): AdminCaller,
) -> Result<Json<SweepResult>> {
    let cancelled = state
        .commerce()
        .back_office()
        .sweep_orphans(&caller)
        .await?;
    info!(cancelled, "Orphan sweep run from admin API");
    Ok(Json(SweepResult { cancelled }))
}
