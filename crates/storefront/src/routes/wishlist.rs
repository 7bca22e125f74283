//! Wishlist route handlers.
//!
//! Only product ids are kept in the session; products are looked up fresh on
//! every read so removed or deactivated ones drop out.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use modesta_commerce::models::Product;
use modesta_core::ProductId;

use crate::error::Result;
use crate::models::{Wishlist, session_keys};
use crate::state::AppState;

use super::products::active_product;

#[derive(Debug, Serialize)]
pub struct WishlistView {
    pub items: Vec<Product>,
}

#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: ProductId,
}

async fn load(session: &Session) -> Result<Wishlist> {
    Ok(session
        .get::<Wishlist>(session_keys::WISHLIST)
        .await?
        .unwrap_or_default())
}

async fn view(state: &AppState, wishlist: &Wishlist) -> Result<WishlistView> {
    let catalog = state.commerce().catalog();
    let mut items = Vec::with_capacity(wishlist.product_ids.len());
    for id in &wishlist.product_ids {
        if let Some(product) = catalog.product(*id).await?.filter(|p| p.active) {
            items.push(product);
        }
    }
    Ok(WishlistView { items })
}

/// Show saved products.
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<WishlistView>> {
    let wishlist = load(&session).await?;
    Ok(Json(view(&state, &wishlist).await?))
}

/// Save a product.
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<WishlistForm>,
) -> Result<Json<WishlistView>> {
    active_product(&state, form.product_id).await?;

    let mut wishlist = load(&session).await?;
    if wishlist.add(form.product_id) {
        session.insert(session_keys::WISHLIST, &wishlist).await?;
    }
    Ok(Json(view(&state, &wishlist).await?))
}

/// Forget a product.
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<WishlistForm>,
) -> Result<Json<WishlistView>> {
    let mut wishlist = load(&session).await?;
    if wishlist.remove(form.product_id) {
        session.insert(session_keys::WISHLIST, &wishlist).await?;
    }
    Ok(Json(view(&state, &wishlist).await?))
}
