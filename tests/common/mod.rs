#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use dress_store_api::{
    dto::orders::{CreateOrderRequest, OrderItemRequest, PaymentRequest, ShippingAddressRequest},
    middleware::auth::{AuthUser, Role, issue_token},
    models::{ColorStock, PaymentMethod, Product, ProductStatus, SizeStock, slugify},
    order::PricingPolicy,
    repository::memory::MemoryStore,
    state::AppState,
};
use uuid::Uuid;

pub const SECRET: &str = "integration-secret";

pub fn dress(name: &str, price: i64, sizes: &[(&str, i32)], colors: &[(&str, i32)]) -> Product {
    let now = Utc::now();
    let mut product = Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        slug: slugify(name),
        description: Some(format!("{name} for testing")),
        category: "Summer".into(),
        price,
        discount: 0,
        image: None,
        sizes: sizes
            .iter()
            .map(|(size, stock)| SizeStock {
                size: size.to_string(),
                stock: *stock,
            })
            .collect(),
        colors: colors
            .iter()
            .map(|(name, stock)| ColorStock {
                name: name.to_string(),
                hex_code: None,
                stock: *stock,
            })
            .collect(),
        status: ProductStatus::Active,
        featured: false,
        created_at: now,
        updated_at: now,
    };
    if product.total_stock() == 0 {
        product.status = ProductStatus::OutOfStock;
    }
    product
}

/// State over a fresh in-memory store; the returned store shares its data.
pub async fn memory_state(products: Vec<Product>) -> (AppState, MemoryStore) {
    let store = MemoryStore::with_products(products).await;
    let state = AppState::new(Arc::new(store.clone()), PricingPolicy::default(), SECRET);
    (state, store)
}

pub fn customer() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::User,
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::Admin,
    }
}

pub fn token_for(user: &AuthUser) -> String {
    issue_token(SECRET, user.user_id, user.role, Duration::hours(1)).unwrap()
}

pub fn line(product: &Product, quantity: i32, size: &str, color: &str) -> OrderItemRequest {
    OrderItemRequest {
        product: product.id,
        quantity,
        size: size.to_string(),
        color: color.to_string(),
    }
}

pub fn order_request(items: Vec<OrderItemRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        items,
        shipping_address: ShippingAddressRequest {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "asha@example.com".into(),
            phone: "9876543211".into(),
            street: "123 Main Street".into(),
            city: "Mumbai".into(),
            state: "Maharashtra".into(),
            zip_code: "400001".into(),
            country: None,
        },
        payment: PaymentRequest {
            method: PaymentMethod::Cod,
            transaction_id: None,
        },
        notes: None,
        special_instructions: None,
    }
}

pub fn size_stock(product: &Product, size: &str) -> i32 {
    product.size_entry(size).map(|s| s.stock).unwrap_or(-1)
}

pub fn color_stock(product: &Product, color: &str) -> i32 {
    product.color_entry(color).map(|c| c.stock).unwrap_or(-1)
}
