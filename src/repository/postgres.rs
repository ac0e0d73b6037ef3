use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    audit::AuditEntry,
    db::{DbPool, OrmConn, orm_from_pool},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        order_timeline::{
            ActiveModel as TimelineActive, Column as TimelineCol, Entity as OrderTimeline,
            Model as TimelineModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    inventory::{self, StockOutcome},
    models::{LineItem, Payment, Product, ProductSort, ProductStatus, TimelineEntry},
    order::Order,
};

use super::{
    AuditSink, CatalogStore, OrderFilter, OrderStore, Page, PageRequest, ProductFilter,
    StockReconciliation, ensure_next_step,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    orm: OrmConn,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        let orm = orm_from_pool(&pool);
        Self { pool, orm }
    }
}

/// Locks the rows in id order so concurrent orders over the same products
/// cannot deadlock. Ids with no row are simply absent from the result.
async fn lock_products<C: ConnectionTrait>(conn: &C, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();

    let models = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(conn)
        .await?;

    models
        .into_iter()
        .map(|model| product_from_entity(model).map(|p| (p.id, p)))
        .collect()
}

/// Updates the order row and appends the new timeline entry. The row lock is
/// held until commit, so a second writer re-reads the committed status.
async fn write_order_changes<C: ConnectionTrait>(conn: &C, order: &Order) -> AppResult<()> {
    let existing = Orders::find_by_id(order.id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    let stored = OrderTimeline::find()
        .filter(TimelineCol::OrderId.eq(order.id))
        .count(conn)
        .await? as usize;
    ensure_next_step(parse_column(&existing.status, "orders.status")?, stored, order)?;

    order_active(order)?.update(conn).await?;
    if let Some(entry) = order.timeline().last() {
        timeline_active(order.id, stored, entry).insert(conn).await?;
    }
    Ok(())
}

async fn load_order_parts<C: ConnectionTrait>(
    conn: &C,
    models: Vec<OrderModel>,
) -> AppResult<Vec<Order>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();

    let mut items: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    for item in OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids.clone()))
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?
    {
        items.entry(item.order_id).or_default().push(item);
    }

    let mut timeline: HashMap<Uuid, Vec<TimelineModel>> = HashMap::new();
    for entry in OrderTimeline::find()
        .filter(TimelineCol::OrderId.is_in(ids))
        .order_by_asc(TimelineCol::Position)
        .all(conn)
        .await?
    {
        timeline.entry(entry.order_id).or_default().push(entry);
    }

    models
        .into_iter()
        .map(|model| {
            let order_items = items.remove(&model.id).unwrap_or_default();
            let entries = timeline.remove(&model.id).unwrap_or_default();
            order_from_entity(model, order_items, entries)
        })
        .collect()
}

fn order_condition(filter: &OrderFilter) -> Condition {
    let mut condition = Condition::all();
    if let Some(owner) = filter.owner {
        condition = condition.add(OrderCol::UserId.eq(owner));
    }
    if let Some(status) = filter.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    condition
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Products::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn find_product_by_slug(&self, slug: &str) -> AppResult<Option<Product>> {
        Products::find()
            .filter(ProdCol::Slug.eq(slug))
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> AppResult<Page<Product>> {
        let mut condition = Condition::all();
        if let Some(search) = filter.search.as_ref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                    .add(Expr::col(ProdCol::Description).ilike(pattern)),
            );
        }
        if let Some(category) = filter.category.as_ref().filter(|c| !c.is_empty()) {
            condition = condition.add(Expr::col(ProdCol::Category).ilike(category.clone()));
        }
        if let Some(status) = filter.status {
            condition = condition.add(ProdCol::Status.eq(status.as_str()));
        }
        if let Some(min) = filter.min_price {
            condition = condition.add(ProdCol::Price.gte(min));
        }
        if let Some(max) = filter.max_price {
            condition = condition.add(ProdCol::Price.lte(max));
        }
        if !filter.sizes.is_empty() {
            let mut any = Condition::any();
            for size in &filter.sizes {
                let needle = serde_json::json!([{ "size": size }]).to_string();
                any = any.add(Expr::cust_with_values("sizes @> $1::jsonb", [needle]));
            }
            condition = condition.add(any);
        }
        if !filter.colors.is_empty() {
            let mut any = Condition::any();
            for color in &filter.colors {
                let needle = serde_json::json!([{ "name": color }]).to_string();
                any = any.add(Expr::cust_with_values("colors @> $1::jsonb", [needle]));
            }
            condition = condition.add(any);
        }
        if let Some(featured) = filter.featured {
            condition = condition.add(ProdCol::Featured.eq(featured));
        }

        let finder = Products::find().filter(condition);
        let finder = match filter.sort {
            ProductSort::Newest => finder,
            ProductSort::PriceAsc => finder.order_by_asc(ProdCol::Price),
            ProductSort::PriceDesc => finder.order_by_desc(ProdCol::Price),
            ProductSort::NameAsc => finder.order_by_asc(ProdCol::Name),
            ProductSort::NameDesc => finder.order_by_desc(ProdCol::Name),
        }
        .order_by_desc(ProdCol::CreatedAt);
        let total = finder.clone().count(&self.orm).await? as i64;
        let items = finder
            .limit(page.limit as u64)
            .offset(page.offset() as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn product_categories(&self) -> AppResult<Vec<String>> {
        let categories = Products::find()
            .select_only()
            .column(ProdCol::Category)
            .distinct()
            .filter(ProdCol::Status.eq(ProductStatus::Active.as_str()))
            .order_by_asc(ProdCol::Category)
            .into_tuple::<String>()
            .all(&self.orm)
            .await?;
        Ok(categories)
    }

    async fn insert_product(&self, product: &Product) -> AppResult<()> {
        if self.find_product_by_slug(&product.slug).await?.is_some() {
            return Err(AppError::BadRequest(format!(
                "A product with slug {} already exists",
                product.slug
            )));
        }
        product_active(product)?.insert(&self.orm).await?;
        Ok(())
    }

    async fn save_product(&self, product: &Product) -> AppResult<()> {
        let clash = Products::find()
            .filter(ProdCol::Slug.eq(product.slug.as_str()))
            .filter(ProdCol::Id.ne(product.id))
            .one(&self.orm)
            .await?;
        if clash.is_some() {
            return Err(AppError::BadRequest(format!(
                "A product with slug {} already exists",
                product.slug
            )));
        }

        let txn = self.orm.begin().await?;
        let locked = lock_products(&txn, &[product.id]).await?;
        if !locked.contains_key(&product.id) {
            return Err(AppError::NotFound("Product not found".into()));
        }
        product_active(product)?.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn restock(&self, id: Uuid, size: &str, color: &str, quantity: i32) -> AppResult<Product> {
        let txn = self.orm.begin().await?;
        let mut locked = lock_products(&txn, &[id]).await?;
        let mut product = locked
            .remove(&id)
            .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

        inventory::restock(&mut product, size, color, quantity)?;
        product.updated_at = Utc::now();
        product_active(&product)?.update(&txn).await?;

        txn.commit().await?;
        Ok(product)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let Some(model) = Orders::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        Ok(load_order_parts(&self.orm, vec![model]).await?.pop())
    }

    async fn count_orders(&self, filter: &OrderFilter) -> AppResult<i64> {
        let total = Orders::find()
            .filter(order_condition(filter))
            .count(&self.orm)
            .await?;
        Ok(total as i64)
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> AppResult<Page<Order>> {
        let finder = Orders::find()
            .filter(order_condition(filter))
            .order_by_desc(OrderCol::CreatedAt);
        let total = finder.clone().count(&self.orm).await? as i64;
        let models = finder
            .limit(page.limit as u64)
            .offset(page.offset() as u64)
            .all(&self.orm)
            .await?;
        let items = load_order_parts(&self.orm, models).await?;
        Ok(Page { items, total })
    }

    async fn place_order(&self, order: &Order) -> AppResult<()> {
        // Dropping `txn` on any early return rolls everything back.
        let txn = self.orm.begin().await?;

        let ids: Vec<Uuid> = order.items().iter().map(|item| item.product).collect();
        let mut products = lock_products(&txn, &ids).await?;
        for item in order.items() {
            let product = products.get_mut(&item.product).ok_or_else(|| {
                AppError::NotFound(format!("Product not found: {}", item.product))
            })?;
            inventory::reserve(product, &item.size, &item.color, item.quantity)?;
        }
        for product in products.values_mut() {
            product.updated_at = order.created_at;
            product_active(product)?.update(&txn).await?;
        }

        order_active(order)?.insert(&txn).await?;
        let items: Vec<OrderItemActive> = order
            .items()
            .iter()
            .enumerate()
            .map(|(position, item)| order_item_active(order.id, position, item))
            .collect();
        OrderItems::insert_many(items).exec(&txn).await?;
        let entries: Vec<TimelineActive> = order
            .timeline()
            .iter()
            .enumerate()
            .map(|(position, entry)| timeline_active(order.id, position, entry))
            .collect();
        OrderTimeline::insert_many(entries).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn cancel_order(&self, order: &Order) -> AppResult<Vec<StockReconciliation>> {
        let txn = self.orm.begin().await?;
        write_order_changes(&txn, order).await?;

        let ids: Vec<Uuid> = order.items().iter().map(|item| item.product).collect();
        let mut products = lock_products(&txn, &ids).await?;
        let mut missing = Vec::new();
        let mut touched = Vec::new();
        for item in order.items() {
            let Some(product) = products.get_mut(&item.product) else {
                missing.push(StockReconciliation::new(item, "product missing"));
                continue;
            };
            match inventory::reverse_stock(product, &item.size, &item.color, item.quantity) {
                StockOutcome::Applied => touched.push(item.product),
                StockOutcome::VariantMissing => {
                    missing.push(StockReconciliation::new(item, "variant missing"))
                }
            }
        }
        touched.sort();
        touched.dedup();
        for id in touched {
            if let Some(product) = products.get_mut(&id) {
                product.updated_at = order.updated_at;
                product_active(product)?.update(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(missing)
    }

    async fn save_order(&self, order: &Order) -> AppResult<()> {
        let txn = self.orm.begin().await?;
        write_order_changes(&txn, order).await?;
        txn.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn record_audit(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| AppError::Internal(e.into()))
}

fn parse_column<T: std::str::FromStr>(value: &str, column: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("unexpected {column} value {value:?}")))
}

fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    Ok(Product {
        id: model.id,
        name: model.name,
        slug: model.slug,
        description: model.description,
        category: model.category,
        price: model.price,
        discount: model.discount,
        image: model.image,
        sizes: from_json(model.sizes)?,
        colors: from_json(model.colors)?,
        status: parse_column(&model.status, "products.status")?,
        featured: model.featured,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn product_active(product: &Product) -> AppResult<ProductActive> {
    Ok(ProductActive {
        id: Set(product.id),
        name: Set(product.name.clone()),
        slug: Set(product.slug.clone()),
        description: Set(product.description.clone()),
        category: Set(product.category.clone()),
        price: Set(product.price),
        discount: Set(product.discount),
        image: Set(product.image.clone()),
        sizes: Set(to_json(&product.sizes)?),
        colors: Set(to_json(&product.colors)?),
        status: Set(product.status.as_str().to_string()),
        featured: Set(product.featured),
        created_at: Set(product.created_at.into()),
        updated_at: Set(product.updated_at.into()),
    })
}

fn order_from_entity(
    model: OrderModel,
    items: Vec<OrderItemModel>,
    timeline: Vec<TimelineModel>,
) -> AppResult<Order> {
    let timeline = timeline
        .into_iter()
        .map(|entry| {
            Ok(TimelineEntry {
                status: parse_column(&entry.status, "order_timeline.status")?,
                message: entry.message,
                timestamp: entry.created_at.with_timezone(&Utc),
                updated_by: entry.updated_by,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Order {
        id: model.id,
        order_number: model.order_number,
        user_id: model.user_id,
        items: items.into_iter().map(order_item_from_entity).collect(),
        subtotal: model.subtotal,
        tax: model.tax,
        shipping: model.shipping,
        discount: model.discount,
        total: model.total,
        shipping_address: from_json(model.shipping_address)?,
        payment: Payment {
            method: parse_column(&model.payment_method, "orders.payment_method")?,
            status: parse_column(&model.payment_status, "orders.payment_status")?,
            transaction_id: model.transaction_id,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        },
        status: parse_column(&model.status, "orders.status")?,
        tracking: model.tracking.map(from_json).transpose()?,
        timeline,
        notes: model.notes,
        special_instructions: model.special_instructions,
        confirmed_at: model.confirmed_at.map(|dt| dt.with_timezone(&Utc)),
        shipped_at: model.shipped_at.map(|dt| dt.with_timezone(&Utc)),
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_active(order: &Order) -> AppResult<OrderActive> {
    Ok(OrderActive {
        id: Set(order.id),
        order_number: Set(order.order_number.clone()),
        user_id: Set(order.user_id),
        subtotal: Set(order.subtotal()),
        tax: Set(order.tax()),
        shipping: Set(order.shipping()),
        discount: Set(order.discount()),
        total: Set(order.total()),
        shipping_address: Set(to_json(&order.shipping_address)?),
        payment_method: Set(order.payment.method.as_str().to_string()),
        payment_status: Set(order.payment.status.as_str().to_string()),
        transaction_id: Set(order.payment.transaction_id.clone()),
        paid_at: Set(order.payment.paid_at.map(Into::into)),
        status: Set(order.status().as_str().to_string()),
        tracking: Set(order.tracking.as_ref().map(to_json).transpose()?),
        notes: Set(order.notes.clone()),
        special_instructions: Set(order.special_instructions.clone()),
        confirmed_at: Set(order.confirmed_at().map(Into::into)),
        shipped_at: Set(order.shipped_at().map(Into::into)),
        delivered_at: Set(order.delivered_at().map(Into::into)),
        cancelled_at: Set(order.cancelled_at().map(Into::into)),
        created_at: Set(order.created_at.into()),
        updated_at: Set(order.updated_at.into()),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> LineItem {
    LineItem {
        product: model.product_id,
        name: model.name,
        image: model.image,
        price: model.price,
        quantity: model.quantity,
        size: model.size,
        color: model.color,
        subtotal: model.subtotal,
    }
}

fn order_item_active(order_id: Uuid, position: usize, item: &LineItem) -> OrderItemActive {
    OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        position: Set(position as i32),
        product_id: Set(item.product),
        name: Set(item.name.clone()),
        image: Set(item.image.clone()),
        price: Set(item.price),
        quantity: Set(item.quantity),
        size: Set(item.size.clone()),
        color: Set(item.color.clone()),
        subtotal: Set(item.subtotal),
    }
}

fn timeline_active(order_id: Uuid, position: usize, entry: &TimelineEntry) -> TimelineActive {
    TimelineActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        position: Set(position as i32),
        status: Set(entry.status.as_str().to_string()),
        message: Set(entry.message.clone()),
        updated_by: Set(entry.updated_by),
        created_at: Set(entry.timestamp.into()),
    }
}
