//! Persistence interface used by the services.
//!
//! Two implementations: [`postgres::PgStore`] over SeaORM, and
//! [`memory::MemoryStore`] used when no database is configured and in tests.
//! The two order operations that touch stock (`place_order`, `cancel_order`)
//! are all-or-nothing in both.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    audit::AuditEntry,
    error::{AppError, AppResult},
    lifecycle::OrderStatus,
    models::{LineItem, Product, ProductSort, ProductStatus},
    order::Order,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Products offering any of these sizes.
    pub sizes: Vec<String>,
    /// Products offering any of these colors.
    pub colors: Vec<String>,
    pub featured: Option<bool>,
    pub sort: ProductSort,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&needle);
            let in_description = product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !product.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| product.price < min)
            || self.max_price.is_some_and(|max| product.price > max)
        {
            return false;
        }
        if !self.sizes.is_empty() && !product.sizes.iter().any(|s| self.sizes.contains(&s.size)) {
            return false;
        }
        if !self.colors.is_empty() && !product.colors.iter().any(|c| self.colors.contains(&c.name)) {
            return false;
        }
        if self.featured.is_some_and(|featured| product.featured != featured) {
            return false;
        }
        self.status.is_none_or(|status| product.status == status)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub owner: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.owner.is_none_or(|owner| order.user_id == owner)
            && self.status.is_none_or(|status| order.status() == status)
    }
}

/// A line item whose stock could not be given back on cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReconciliation {
    pub product: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub reason: String,
}

impl StockReconciliation {
    pub(crate) fn new(item: &LineItem, reason: &str) -> Self {
        Self {
            product: item.product,
            size: item.size.clone(),
            color: item.color.clone(),
            quantity: item.quantity,
            reason: reason.to_string(),
        }
    }
}

/// Rejects a write built from a stale read. The caller's copy must be the
/// stored order plus exactly one status change.
pub(crate) fn ensure_next_step(
    stored_status: OrderStatus,
    stored_entries: usize,
    order: &Order,
) -> AppResult<()> {
    let entries = order.timeline();
    let previous = entries
        .len()
        .checked_sub(2)
        .and_then(|idx| entries.get(idx))
        .map(|entry| entry.status);
    if entries.len() == stored_entries + 1 && previous == Some(stored_status) {
        return Ok(());
    }
    Err(AppError::InvalidState(format!(
        "Order {} was changed by another request",
        order.order_number
    )))
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn find_product_by_slug(&self, slug: &str) -> AppResult<Option<Product>>;

    /// Ordered by `filter.sort`.
    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> AppResult<Page<Product>>;

    /// Distinct categories of active products, alphabetical.
    async fn product_categories(&self) -> AppResult<Vec<String>>;

    async fn insert_product(&self, product: &Product) -> AppResult<()>;

    async fn save_product(&self, product: &Product) -> AppResult<()>;

    /// Adds stock to one size/color pair under the product lock.
    async fn restock(&self, id: Uuid, size: &str, color: &str, quantity: i32) -> AppResult<Product>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn count_orders(&self, filter: &OrderFilter) -> AppResult<i64>;

    /// Newest first.
    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> AppResult<Page<Order>>;

    /// Reserves stock for every line item and inserts the order. Either all
    /// reservations and the insert happen, or none do.
    async fn place_order(&self, order: &Order) -> AppResult<()>;

    /// Persists a cancelled order and gives every line item's stock back in one
    /// unit. Items whose product or variant is gone are reported, not fatal.
    /// Fails with `InvalidState` when the stored order moved on since it was read.
    async fn cancel_order(&self, order: &Order) -> AppResult<Vec<StockReconciliation>>;

    /// Persists status, dates, tracking and the new timeline entry. Same
    /// staleness check as `cancel_order`.
    async fn save_order(&self, order: &Order) -> AppResult<()>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_audit(&self, entry: AuditEntry) -> AppResult<()>;
}

pub trait Store: CatalogStore + OrderStore + AuditSink {}

impl<T: CatalogStore + OrderStore + AuditSink> Store for T {}
