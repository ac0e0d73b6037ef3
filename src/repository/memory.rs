use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    audit::AuditEntry,
    error::{AppError, AppResult},
    inventory::{self, StockOutcome},
    models::{Product, ProductStatus},
    order::Order,
};

use super::{
    AuditSink, CatalogStore, OrderFilter, OrderStore, Page, PageRequest, ProductFilter,
    StockReconciliation, ensure_next_step,
};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    audit: Vec<AuditEntry>,
}

/// Store kept behind one async mutex, so every operation is serialized.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().await;
            for product in products {
                state.products.insert(product.id, product);
            }
        }
        store
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    /// Drops a product; used to simulate catalog deletions.
    pub async fn remove_product(&self, id: Uuid) -> Option<Product> {
        self.state.lock().await.products.remove(&id)
    }
}

fn paginate<T: Clone>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as i64;
    let offset = page.offset().max(0) as usize;
    let items = if offset >= items.len() {
        Vec::new()
    } else {
        items
            .drain(offset..)
            .take(page.limit.max(0) as usize)
            .collect()
    };
    Page { items, total }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_product_by_slug(&self, slug: &str) -> AppResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.values().find(|p| p.slug == slug).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> AppResult<Page<Product>> {
        let state = self.state.lock().await;
        let mut items: Vec<Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        items.sort_by(|a, b| filter.sort.compare(a, b));
        Ok(paginate(items, page))
    }

    async fn product_categories(&self) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        let mut categories: Vec<String> = state
            .products
            .values()
            .filter(|p| p.status == ProductStatus::Active)
            .map(|p| p.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn insert_product(&self, product: &Product) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.slug == product.slug) {
            return Err(AppError::BadRequest(format!(
                "A product with slug {} already exists",
                product.slug
            )));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn save_product(&self, product: &Product) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&product.id) {
            return Err(AppError::NotFound("Product not found".into()));
        }
        if state
            .products
            .values()
            .any(|p| p.slug == product.slug && p.id != product.id)
        {
            return Err(AppError::BadRequest(format!(
                "A product with slug {} already exists",
                product.slug
            )));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn restock(&self, id: Uuid, size: &str, color: &str, quantity: i32) -> AppResult<Product> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
        let mut staged = product.clone();
        inventory::restock(&mut staged, size, color, quantity)?;
        staged.updated_at = Utc::now();
        *product = staged.clone();
        Ok(staged)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn count_orders(&self, filter: &OrderFilter) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.orders.values().filter(|o| filter.matches(o)).count() as i64)
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> AppResult<Page<Order>> {
        let state = self.state.lock().await;
        let mut items: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(items, page))
    }

    async fn place_order(&self, order: &Order) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(AppError::InvalidState(format!(
                "Order number {} already exists",
                order.order_number
            )));
        }

        // Work on copies; the shared map is only touched once every item fits.
        let mut staged: HashMap<Uuid, Product> = HashMap::new();
        for item in order.items() {
            if !staged.contains_key(&item.product) {
                let product = state.products.get(&item.product).cloned().ok_or_else(|| {
                    AppError::NotFound(format!("Product not found: {}", item.product))
                })?;
                staged.insert(item.product, product);
            }
            if let Some(product) = staged.get_mut(&item.product) {
                inventory::reserve(product, &item.size, &item.color, item.quantity)?;
                product.updated_at = order.created_at;
            }
        }

        state.products.extend(staged);
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn cancel_order(&self, order: &Order) -> AppResult<Vec<StockReconciliation>> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .get(&order.id)
            .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
        ensure_next_step(stored.status(), stored.timeline().len(), order)?;

        let mut missing = Vec::new();
        for item in order.items() {
            match state.products.get_mut(&item.product) {
                Some(product) => {
                    match inventory::reverse_stock(product, &item.size, &item.color, item.quantity) {
                        StockOutcome::Applied => product.updated_at = order.updated_at,
                        StockOutcome::VariantMissing => {
                            missing.push(StockReconciliation::new(item, "variant missing"))
                        }
                    }
                }
                None => missing.push(StockReconciliation::new(item, "product missing")),
            }
        }

        state.orders.insert(order.id, order.clone());
        Ok(missing)
    }

    async fn save_order(&self, order: &Order) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .get(&order.id)
            .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
        ensure_next_step(stored.status(), stored.timeline().len(), order)?;
        state.orders.insert(order.id, order.clone());
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record_audit(&self, entry: AuditEntry) -> AppResult<()> {
        self.state.lock().await.audit.push(entry);
        Ok(())
    }
}
