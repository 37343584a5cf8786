//! Order placement.
//!
//! Runs the checkout steps in order: validate input, price the cart against
//! the stored catalog, upload the payment proof, record the order and its
//! items, then take the stock. Validation failures stop before anything is
//! written. Later failures are not rolled back beyond removing a half-written
//! order, and nothing is retried.

use chrono::Utc;
use pinkaura_core::{
    CartLine, CartTotals, ClientTotals, CustomerDetails, NewOrder, NewOrderItem, Order,
    PricedCart, Product, validate_cart,
};
use tracing::{error, info, instrument, warn};

use crate::error::{AppError, add_breadcrumb};
use crate::services::media::ImageUpload;
use crate::state::AppState;

/// A parsed order form.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
    pub cart: Vec<CartLine>,
    pub customer: CustomerDetails,
    pub client_totals: ClientTotals,
    pub screenshot: ImageUpload,
}

/// A recorded order and the totals the server charged.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub totals: CartTotals,
}

/// Record an order for a validated, priced cart and take its stock.
///
/// # Errors
///
/// - `AppError::Media` if the screenshot is not an acceptable image or the
///   upload fails
/// - `AppError::Customer` listing every invalid customer field
/// - `AppError::Checkout` for unknown products or variants, short stock, or a
///   client total outside the tolerance
/// - `AppError::Store` if the order or the stock cannot be written
#[instrument(skip(state, submission), fields(lines = submission.cart.len()))]
pub async fn place_order(
    state: &AppState,
    submission: OrderSubmission,
) -> Result<PlacedOrder, AppError> {
    let OrderSubmission {
        cart,
        customer,
        client_totals,
        screenshot,
    } = submission;

    screenshot.check_any_image()?;
    let customer = customer.validate()?;

    let policy = &state.config().pricing;
    let snapshot = state.store().load_catalog().await?;
    let priced = validate_cart(&snapshot.products, &cart, policy)?;
    priced.verify_client_totals(&client_totals, policy)?;
    add_breadcrumb(
        "order",
        "Cart validated",
        &[("total", &priced.totals.total.to_string())],
    );

    let media = state.media()?;
    let proof = media.upload(screenshot, media.proof_folder()).await?;
    add_breadcrumb("order", "Payment proof uploaded", &[("public_id", &proof.public_id)]);

    let order = match record_order(state, customer, &priced, proof.url, &proof.public_id).await {
        Ok(order) => order,
        Err(e) => {
            media.spawn_destroy(proof.public_id);
            return Err(e);
        }
    };

    if let Err(e) = state.store().commit_stock(&priced.decrements).await {
        error!(
            error = %e,
            order_number = %order.order_number,
            "Order recorded but stock was not decremented"
        );
        state.invalidate_catalog().await;
        return Err(e.into());
    }
    state.invalidate_catalog().await;

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %priced.totals.total,
        "Order placed"
    );
    state.mailer().spawn_order_emails(order.clone());

    Ok(PlacedOrder {
        order,
        totals: priced.totals,
    })
}

/// Insert the order and its items, removing the order again if the items
/// cannot be written.
async fn record_order(
    state: &AppState,
    customer: CustomerDetails,
    priced: &PricedCart,
    proof_url: String,
    proof_public_id: &str,
) -> Result<Order, AppError> {
    let store = state.store();
    let new = NewOrder::pending(
        customer,
        priced,
        proof_url,
        Some(proof_public_id.to_string()),
        Utc::now(),
    );
    let mut order = store.insert_order(new).await?;

    let items: Vec<NewOrderItem> = priced.lines.iter().map(NewOrderItem::from).collect();
    match store.insert_order_items(order.id, items).await {
        Ok(stored) => {
            order.items = stored;
            Ok(order)
        }
        Err(e) => {
            if let Err(cleanup) = store.delete_order(order.id).await {
                warn!(
                    error = %cleanup,
                    order_id = %order.id,
                    "Failed to remove order after its items could not be saved"
                );
            }
            Err(e.into())
        }
    }
}

/// Take stock for a cart without recording an order. Only existence and
/// stock are checked. Returns the updated products.
///
/// # Errors
///
/// Returns `AppError::Checkout` for unknown variants or short stock, or
/// `AppError::Store` if the stock cannot be written.
#[instrument(skip(state, cart), fields(lines = cart.len()))]
pub async fn decrement_stock(
    state: &AppState,
    cart: &[CartLine],
) -> Result<Vec<Product>, AppError> {
    let snapshot = state.store().load_catalog().await?;
    let priced = validate_cart(&snapshot.products, cart, &state.config().pricing)?;

    let updated = state.store().commit_stock(&priced.decrements).await;
    state.invalidate_catalog().await;
    let updated = updated?;

    info!(products = updated.len(), "Stock decremented");
    Ok(updated)
}
