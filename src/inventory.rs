//! Stock checks and mutations on a single product.
//!
//! Size and color stock are two independent counters: a sale of `q` units takes
//! `q` from the size entry and `q` from the color entry. Availability for a
//! (size, color) pair is therefore the smaller of the two counters.

use crate::{
    error::AppError,
    models::{Product, ProductStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockOutcome {
    Applied,
    /// The size or color entry does not exist; nothing was changed.
    VariantMissing,
}

/// With both `size` and `color`, true iff both entries exist with positive
/// stock. Otherwise true iff the product has any size stock left.
pub fn is_in_stock(product: &Product, size: Option<&str>, color: Option<&str>) -> bool {
    match (size, color) {
        (Some(size), Some(color)) => {
            let size_ok = product.size_entry(size).is_some_and(|s| s.stock > 0);
            let color_ok = product.color_entry(color).is_some_and(|c| c.stock > 0);
            size_ok && color_ok
        }
        _ => product.total_stock() > 0,
    }
}

/// Units that can be sold for the pair, or `None` when either entry is absent.
pub fn available(product: &Product, size: &str, color: &str) -> Option<i32> {
    let size_stock = product.size_entry(size)?.stock;
    let color_stock = product.color_entry(color)?.stock;
    Some(size_stock.min(color_stock).max(0))
}

pub fn has_available(product: &Product, size: &str, color: &str, quantity: i32) -> bool {
    available(product, size, color).is_some_and(|units| units >= quantity)
}

/// Takes `quantity` from both counters. Does not check availability; callers
/// go through [`reserve`] unless they already did.
pub fn update_stock(product: &mut Product, size: &str, color: &str, quantity: i32) -> StockOutcome {
    let outcome = apply_delta(product, size, color, -quantity);
    if outcome == StockOutcome::Applied && product.total_stock() == 0 {
        product.status = ProductStatus::OutOfStock;
    }
    outcome
}

/// Gives `quantity` back to both counters after a cancellation.
pub fn reverse_stock(product: &mut Product, size: &str, color: &str, quantity: i32) -> StockOutcome {
    let outcome = apply_delta(product, size, color, quantity);
    if outcome == StockOutcome::Applied {
        reopen_if_restocked(product);
    }
    outcome
}

/// Checked decrement used inside the atomic order placement.
pub fn reserve(product: &mut Product, size: &str, color: &str, quantity: i32) -> Result<(), AppError> {
    if !has_available(product, size, color, quantity) {
        return Err(out_of_stock(product, size, color));
    }
    match update_stock(product, size, color, quantity) {
        StockOutcome::Applied => Ok(()),
        StockOutcome::VariantMissing => Err(out_of_stock(product, size, color)),
    }
}

/// Admin restock of one size/color pair.
pub fn restock(product: &mut Product, size: &str, color: &str, quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".into()));
    }
    match reverse_stock(product, size, color, quantity) {
        StockOutcome::Applied => Ok(()),
        StockOutcome::VariantMissing => Err(AppError::NotFound(format!(
            "Product {} has no size {size} or color {color}",
            product.name
        ))),
    }
}

pub fn out_of_stock(product: &Product, size: &str, color: &str) -> AppError {
    AppError::OutOfStock(format!(
        "Product {} is out of stock for size {size} and color {color}",
        product.name
    ))
}

fn apply_delta(product: &mut Product, size: &str, color: &str, delta: i32) -> StockOutcome {
    let size_idx = product.sizes.iter().position(|s| s.size == size);
    let color_idx = product.colors.iter().position(|c| c.name == color);
    let (Some(size_idx), Some(color_idx)) = (size_idx, color_idx) else {
        return StockOutcome::VariantMissing;
    };
    product.sizes[size_idx].stock += delta;
    product.colors[color_idx].stock += delta;
    StockOutcome::Applied
}

fn reopen_if_restocked(product: &mut Product) {
    if product.status == ProductStatus::OutOfStock && product.total_stock() > 0 {
        product.status = ProductStatus::Active;
    }
}
