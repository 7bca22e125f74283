//! Cart route handlers.
//!
//! The cart lives in the session. Each line stores the catalog name and price
//! at the time it was added, for display only.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use modesta_commerce::services::MAX_LINE_QUANTITY;
use modesta_core::{Price, ProductId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CartItem, SessionCart, session_keys};
use crate::state::AppState;

use super::products::active_product;

/// Cart as returned to the browser.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub item_count: u32,
    /// `None` when lines are priced in different currencies.
    pub subtotal: Option<Price>,
}

impl CartView {
    pub(crate) fn new(cart: SessionCart, state: &AppState) -> Self {
        Self {
            item_count: cart.item_count(),
            subtotal: cart.subtotal(state.commerce().catalog().currency()),
            items: cart.items,
        }
    }
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<i64>,
}

/// Update cart request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Remove from cart request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart from the session.
pub(crate) async fn load_cart(session: &Session) -> Result<SessionCart> {
    Ok(session
        .get::<SessionCart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

/// Store the cart in the session.
pub(crate) async fn save_cart(session: &Session, cart: &SessionCart) -> Result<()> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

/// Drop the cart after a completed checkout.
pub(crate) async fn clear_cart(session: &Session) -> Result<()> {
    session.remove::<SessionCart>(session_keys::CART).await?;
    Ok(())
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "quantity must be between 1 and {MAX_LINE_QUANTITY}"
            ))
        })
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the cart.
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::new(cart, &state)))
}

/// Add a product to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<AddToCartForm>,
) -> Result<Json<CartView>> {
    let quantity = positive_quantity(form.quantity.unwrap_or(1))?;
    let product = active_product(&state, form.product_id).await?;

    let mut cart = load_cart(&session).await?;
    cart.add(CartItem {
        product_id: product.id,
        name: product.name,
        unit_price: product.price,
        quantity,
    });
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        &[("product_id", form.product_id.to_string())],
    );
    Ok(Json(CartView::new(cart, &state)))
}

/// Change the quantity of a line. Zero removes it.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<UpdateCartForm>,
) -> Result<Json<CartView>> {
    let quantity = if form.quantity == 0 {
        0
    } else {
        positive_quantity(form.quantity)?
    };

    let mut cart = load_cart(&session).await?;
    if !cart.set_quantity(form.product_id, quantity) {
        return Err(AppError::NotFound(format!(
            "product {} is not in the cart",
            form.product_id
        )));
    }
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::new(cart, &state)))
}

/// Remove a line. Removing an absent product is not an error.
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RemoveFromCartForm>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    if cart.remove(form.product_id) {
        save_cart(&session, &cart).await?;
    }
    Ok(Json(CartView::new(cart, &state)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::test_support::{TestApp, usd};

    #[tokio::test]
    async fn test_add_uses_catalog_price() {
        let mut app = TestApp::new();
        let abaya = app.product("Linen Abaya", usd(12_000)).await;

        let (status, body) = app
            .post_json(
                "/cart/add",
                &json!({ "product_id": abaya.get(), "quantity": 2, "unit_price": "1.00" }),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item_count"], 2);
        assert_eq!(body["items"][0]["name"], "Linen Abaya");
        assert_eq!(body["subtotal"]["amount"], "240.00");

        let (_, body) = app.get("/cart").await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_quantity_and_unknown_product() {
        let mut app = TestApp::new();
        let abaya = app.product("Linen Abaya", usd(12_000)).await;

        let (status, _) = app
            .post_json("/cart/add", &json!({ "product_id": abaya.get(), "quantity": 0 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for quantity in [-3_i64, 1_000, 3_000_000_000] {
            let (status, _) = app
                .post_json(
                    "/cart/add",
                    &json!({ "product_id": abaya.get(), "quantity": quantity }),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "quantity {quantity}");
        }
        let (_, cart) = app.get("/cart").await;
        assert_eq!(cart["item_count"], 0);

        let (status, _) = app
            .post_json("/cart/add", &json!({ "product_id": 999 }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let mut app = TestApp::new();
        let hijab = app.product("Jersey Hijab", usd(2_000)).await;
        app.post_json("/cart/add", &json!({ "product_id": hijab.get() }))
            .await;

        let (status, body) = app
            .post_json("/cart/update", &json!({ "product_id": hijab.get(), "quantity": 5 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item_count"], 5);

        let (status, _) = app
            .post_json("/cart/update", &json!({ "product_id": 4242, "quantity": 1 }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .post_json("/cart/remove", &json!({ "product_id": hijab.get() }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"], Value::Array(vec![]));
    }
}
