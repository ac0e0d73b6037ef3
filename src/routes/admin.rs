use axum::{
    Json, Router,
    extract::{Path, State},
    routing::patch,
};
use uuid::Uuid;

use crate::{
    dto::products::{ProductResponse, RestockRequest},
    error::AppResult,
    middleware::{auth::AuthUser, validate::ValidatedJson},
    response::ApiResponse,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/inventory/{id}/restock", patch(restock))
}

#[utoipa::path(
    patch,
    path = "/api/admin/inventory/{id}/restock",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Stock added to one size/color pair", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid quantity"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Product or variant not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn restock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RestockRequest>,
) -> AppResult<Json<ApiResponse<ProductResponse>>> {
    let resp = admin_service::restock(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
