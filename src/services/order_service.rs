use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderResponse},
    error::{AppError, AppResult},
    inventory,
    lifecycle::OrderStatus,
    middleware::auth::AuthUser,
    models::{LineItem, Payment, Product},
    order::{NewOrder, Order},
    repository::OrderFilter,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

pub const USER_PAGE_LIMIT: i64 = 10;

/// Validates every line against the catalog, then hands the whole order to the
/// store, which reserves stock and inserts it in a single unit. Nothing is
/// written when any line fails.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    let now = Utc::now();

    // Working copies let two lines on the same product see each other's demand.
    let mut staged: HashMap<Uuid, Product> = HashMap::new();
    let mut items: Vec<LineItem> = Vec::with_capacity(payload.items.len());

    for line in &payload.items {
        if !staged.contains_key(&line.product) {
            let product = state
                .store
                .find_product(line.product)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Product not found: {}", line.product)))?;
            staged.insert(line.product, product);
        }
        let product = staged
            .get_mut(&line.product)
            .ok_or_else(|| AppError::NotFound(format!("Product not found: {}", line.product)))?;

        // Drafts and retired products are hidden from buyers.
        if !product.status.is_purchasable() {
            return Err(AppError::NotFound(format!("Product not found: {}", line.product)));
        }
        if !inventory::is_in_stock(product, Some(&line.size), Some(&line.color)) {
            return Err(inventory::out_of_stock(product, &line.size, &line.color));
        }

        items.push(LineItem::snapshot(product, line.quantity, &line.size, &line.color));
        inventory::reserve(product, &line.size, &line.color, line.quantity)?;
    }

    let sequence = state.store.count_orders(&OrderFilter::default()).await? + 1;
    let CreateOrderRequest {
        shipping_address,
        payment,
        notes,
        special_instructions,
        ..
    } = payload;

    let order = Order::place(
        NewOrder {
            user_id: user.user_id,
            items,
            shipping_address: shipping_address.into_address(),
            payment: Payment::declared(payment.method, payment.transaction_id, now),
            notes,
            special_instructions,
        },
        sequence,
        &state.pricing,
        now,
    );

    state.store.place_order(&order).await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        user_id = %user.user_id,
        total = order.total(),
        "order placed"
    );
    log_audit(
        state.store.as_ref(),
        Some(user.user_id),
        "order_created",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "total": order.total(),
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created successfully",
        OrderResponse::new(order, now),
    ))
}

/// The caller's own orders, newest first.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<Vec<OrderResponse>>> {
    let page = query.pagination().normalize(USER_PAGE_LIMIT);
    let filter = OrderFilter {
        owner: Some(user.user_id),
        status: query.status,
    };
    let result = state.store.list_orders(&filter, page).await?;

    let now = Utc::now();
    let orders = result
        .items
        .into_iter()
        .map(|order| OrderResponse::new(order, now))
        .collect();
    Ok(ApiResponse::paginated(
        "Orders retrieved successfully",
        orders,
        result.total,
        Meta::new(page.page, page.limit, result.total),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderResponse>> {
    let order = load_order(state, id).await?;
    ensure_can_view(&order, user)?;
    Ok(ApiResponse::success(
        "Order retrieved successfully",
        OrderResponse::new(order, Utc::now()),
    ))
}

/// Owner or admin cancellation. Stock for every line goes back in the same
/// unit that persists the cancelled order.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderResponse>> {
    let mut order = load_order(state, id).await?;
    ensure_can_view(&order, user)?;
    if !order.can_be_cancelled() {
        return Err(AppError::InvalidState(
            "Order cannot be cancelled at this stage".into(),
        ));
    }

    let now = Utc::now();
    let message = if order.is_owned_by(user.user_id) {
        "Order cancelled by customer"
    } else {
        "Order cancelled by admin"
    };
    order.update_status(OrderStatus::Cancelled, Some(message), Some(user.user_id), now)?;
    commit_cancellation(state, &order, user).await?;

    Ok(ApiResponse::success(
        "Order cancelled successfully",
        OrderResponse::new(order, now),
    ))
}

pub(crate) async fn load_order(state: &AppState, id: Uuid) -> AppResult<Order> {
    state
        .store
        .find_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}

fn ensure_can_view(order: &Order, user: &AuthUser) -> AppResult<()> {
    if order.is_owned_by(user.user_id) || user.is_admin() {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

/// Persists an order already moved to `cancelled` and restores its stock.
/// Lines that could not be restored are logged for manual reconciliation.
pub(crate) async fn commit_cancellation(
    state: &AppState,
    order: &Order,
    actor: &AuthUser,
) -> AppResult<()> {
    let reconciliations = state.store.cancel_order(order).await?;

    for item in &reconciliations {
        tracing::warn!(
            order_id = %order.id,
            product_id = %item.product,
            size = %item.size,
            color = %item.color,
            quantity = item.quantity,
            reason = %item.reason,
            "stock not restored on cancellation"
        );
        log_audit(
            state.store.as_ref(),
            Some(actor.user_id),
            "stock_reconciliation",
            Some("products"),
            Some(serde_json::json!({
                "order_id": order.id,
                "product_id": item.product,
                "size": item.size,
                "color": item.color,
                "quantity": item.quantity,
                "reason": item.reason,
            })),
        )
        .await;
    }

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        actor = %actor.user_id,
        unrestored = reconciliations.len(),
        "order cancelled"
    );
    log_audit(
        state.store.as_ref(),
        Some(actor.user_id),
        "order_cancelled",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await;
    Ok(())
}
