use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{
        orders::{OrderResponse, UpdateOrderStatusRequest},
        products::{ProductResponse, RestockRequest},
    },
    error::AppResult,
    lifecycle::InventoryEffect,
    middleware::auth::{AuthUser, ensure_admin},
    repository::OrderFilter,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::order_service::{commit_cancellation, load_order},
    state::AppState,
};

pub const ADMIN_PAGE_LIMIT: i64 = 20;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<Vec<OrderResponse>>> {
    ensure_admin(user)?;
    let page = query.pagination().normalize(ADMIN_PAGE_LIMIT);
    let filter = OrderFilter {
        owner: None,
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

/// Moves an order along the lifecycle. The target must be reachable from the
/// current status; a move to `cancelled` restores stock like a customer
/// cancellation.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    ensure_admin(user)?;
    let mut order = load_order(state, id).await?;
    let from = order.status();
    let now = Utc::now();

    order.update_status(payload.status, payload.message.as_deref(), Some(user.user_id), now)?;
    if let Some(tracking) = payload.tracking {
        order.set_tracking(tracking, now);
    }

    match payload.status.inventory_effect() {
        InventoryEffect::RestoreAll => commit_cancellation(state, &order, user).await?,
        InventoryEffect::None => state.store.save_order(&order).await?,
    }

    tracing::info!(
        order_id = %order.id,
        from = %from,
        to = %payload.status,
        admin = %user.user_id,
        "order status updated"
    );
    log_audit(
        state.store.as_ref(),
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "from": from,
            "to": payload.status,
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated successfully",
        OrderResponse::new(order, now),
    ))
}

pub async fn restock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RestockRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    let product = state
        .store
        .restock(id, &payload.size, &payload.color, payload.quantity)
        .await?;

    tracing::info!(
        product_id = %product.id,
        size = %payload.size,
        color = %payload.color,
        quantity = payload.quantity,
        "product restocked"
    );
    log_audit(
        state.store.as_ref(),
        Some(user.user_id),
        "inventory_restock",
        Some("products"),
        Some(serde_json::json!({
            "product_id": product.id,
            "size": payload.size,
            "color": payload.color,
            "quantity": payload.quantity,
        })),
    )
    .await;

    Ok(ApiResponse::success("Inventory updated", product.into()))
}
