use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{CreateProductRequest, ProductResponse, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, ProductStatus, slugify},
    repository::{PageRequest, ProductFilter},
    response::{ApiResponse, Meta},
    routes::params::{LimitQuery, ProductQuery, split_list},
    state::AppState,
};

pub const PRODUCT_PAGE_LIMIT: i64 = 12;
pub const FEATURED_LIMIT: i64 = 6;

fn is_admin(viewer: Option<&AuthUser>) -> bool {
    viewer.is_some_and(AuthUser::is_admin)
}

/// Shoppers see active products unless they ask for another purchasable
/// status. Admins see everything and may filter on any status.
fn visible_status(
    viewer: Option<&AuthUser>,
    requested: Option<ProductStatus>,
) -> AppResult<Option<ProductStatus>> {
    match requested {
        Some(status) if is_admin(viewer) || status.is_purchasable() => Ok(Some(status)),
        Some(_) => Err(AppError::Forbidden),
        None if is_admin(viewer) => Ok(None),
        None => Ok(Some(ProductStatus::Active)),
    }
}

pub async fn list_products(
    state: &AppState,
    viewer: Option<&AuthUser>,
    query: ProductQuery,
) -> AppResult<ApiResponse<Vec<ProductResponse>>> {
    let page = query.pagination().normalize(PRODUCT_PAGE_LIMIT);
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(AppError::BadRequest(
                "minPrice cannot be greater than maxPrice".into(),
            ));
        }
    }

    let filter = ProductFilter {
        search: query.q.filter(|q| !q.trim().is_empty()),
        category: query.category.filter(|c| !c.trim().is_empty()),
        status: visible_status(viewer, query.status)?,
        min_price: query.min_price,
        max_price: query.max_price,
        sizes: split_list(query.sizes.as_deref()),
        colors: split_list(query.colors.as_deref()),
        featured: query.featured,
        sort: query.sort.unwrap_or_default(),
    };
    let result = state.store.list_products(&filter, page).await?;
    Ok(ApiResponse::paginated(
        "Products retrieved successfully",
        result.items.into_iter().map(ProductResponse::from).collect(),
        result.total,
        Meta::new(page.page, page.limit, result.total),
    ))
}

/// Active featured products, newest first.
pub async fn featured_products(
    state: &AppState,
    query: LimitQuery,
) -> AppResult<ApiResponse<Vec<ProductResponse>>> {
    let filter = ProductFilter {
        status: Some(ProductStatus::Active),
        featured: Some(true),
        ..Default::default()
    };
    first_page(
        state,
        &filter,
        query.normalize(FEATURED_LIMIT),
        "Featured products retrieved successfully",
    )
    .await
}

pub async fn products_by_category(
    state: &AppState,
    category: &str,
    query: LimitQuery,
) -> AppResult<ApiResponse<Vec<ProductResponse>>> {
    let filter = ProductFilter {
        category: Some(category.to_string()),
        status: Some(ProductStatus::Active),
        ..Default::default()
    };
    first_page(
        state,
        &filter,
        query.normalize(PRODUCT_PAGE_LIMIT),
        "Products retrieved successfully",
    )
    .await
}

async fn first_page(
    state: &AppState,
    filter: &ProductFilter,
    page: PageRequest,
    message: &str,
) -> AppResult<ApiResponse<Vec<ProductResponse>>> {
    let result = state.store.list_products(filter, page).await?;
    Ok(ApiResponse::listed(
        message,
        result.items.into_iter().map(ProductResponse::from).collect(),
    ))
}

pub async fn categories(state: &AppState) -> AppResult<ApiResponse<Vec<String>>> {
    let categories = state.store.product_categories().await?;
    Ok(ApiResponse::success("Categories retrieved successfully", categories))
}

/// Looks a product up by id, falling back to its slug. Drafts and retired
/// products are only visible to admins.
pub async fn get_product(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id_or_slug: &str,
) -> AppResult<ApiResponse<ProductResponse>> {
    let found = match Uuid::parse_str(id_or_slug) {
        Ok(id) => state.store.find_product(id).await?,
        Err(_) => state.store.find_product_by_slug(id_or_slug).await?,
    };
    let product = found
        .filter(|p| p.status.is_purchasable() || is_admin(viewer))
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    Ok(ApiResponse::success(
        "Product retrieved successfully",
        product.into(),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;

    let slug = slugify(&payload.name);
    if state.store.find_product_by_slug(&slug).await?.is_some() {
        return Err(AppError::BadRequest(format!(
            "A product named {} already exists",
            payload.name.trim()
        )));
    }

    let now = Utc::now();
    let mut product = Product {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        slug,
        description: Some(payload.description.trim().to_string()),
        category: payload.category,
        price: payload.price,
        discount: payload.discount.unwrap_or(0),
        image: payload.image,
        sizes: payload.sizes,
        colors: payload.colors,
        status: payload.status.unwrap_or(ProductStatus::Active),
        featured: payload.featured.unwrap_or(false),
        created_at: now,
        updated_at: now,
    };
    if product.status == ProductStatus::Active && product.total_stock() == 0 {
        product.status = ProductStatus::OutOfStock;
    }

    state.store.insert_product(&product).await?;

    tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
    log_audit(
        state.store.as_ref(),
        Some(user.user_id),
        "product_created",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success("Product created successfully", product.into()))
}

/// Edits descriptive fields. Stock only changes through orders and restocks.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    let mut product = load_product(state, id).await?;

    if let Some(name) = payload.name.map(|n| n.trim().to_string()) {
        if name != product.name {
            let slug = slugify(&name);
            if let Some(other) = state.store.find_product_by_slug(&slug).await? {
                if other.id != product.id {
                    return Err(AppError::BadRequest(format!(
                        "A product named {name} already exists"
                    )));
                }
            }
            product.rename(name);
        }
    }
    if let Some(description) = payload.description {
        product.description = Some(description.trim().to_string());
    }
    if let Some(category) = payload.category {
        product.category = category;
    }
    if let Some(price) = payload.price {
        product.price = price;
    }
    if let Some(discount) = payload.discount {
        product.discount = discount;
    }
    if let Some(image) = payload.image {
        product.image = Some(image);
    }
    if let Some(status) = payload.status {
        product.status = status;
    }
    if let Some(featured) = payload.featured {
        product.featured = featured;
    }
    product.updated_at = Utc::now();

    state.store.save_product(&product).await?;

    tracing::info!(product_id = %product.id, "product updated");
    log_audit(
        state.store.as_ref(),
        Some(user.user_id),
        "product_updated",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success("Product updated successfully", product.into()))
}

/// Soft delete: the product is marked inactive and drops out of the public
/// catalog. Line items that reference it keep their snapshot.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    let mut product = load_product(state, id).await?;
    product.status = ProductStatus::Inactive;
    product.updated_at = Utc::now();

    state.store.save_product(&product).await?;

    tracing::info!(product_id = %product.id, "product deactivated");
    log_audit(
        state.store.as_ref(),
        Some(user.user_id),
        "product_deleted",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success("Product deleted successfully", product.into()))
}

async fn load_product(state: &AppState, id: Uuid) -> AppResult<Product> {
    state
        .store
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}
