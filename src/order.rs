//! The order aggregate.
//!
//! Totals are recomputed by every mutator, so `subtotal` always equals the sum
//! of item subtotals and `total` always equals
//! `subtotal + tax + shipping - discount`. Status only moves through
//! [`Order::update_status`], which appends exactly one timeline entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    lifecycle::{OrderStatus, RETURN_WINDOW_DAYS, ensure_transition},
    models::{LineItem, Payment, ShippingAddress, TimelineEntry, Tracking},
};

/// Tax and shipping rules applied when an order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Tax rate in basis points (1800 = 18%).
    pub tax_rate_bps: i64,
    /// Shipping is free when the subtotal is strictly above this amount.
    pub free_shipping_threshold: i64,
    pub flat_shipping_fee: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: 1800,
            free_shipping_threshold: 1000,
            flat_shipping_fee: 100,
        }
    }
}

impl PricingPolicy {
    /// Rounded half-up to a whole unit.
    pub fn tax_for(&self, subtotal: i64) -> i64 {
        (subtotal * self.tax_rate_bps + 5_000) / 10_000
    }

    pub fn shipping_for(&self, subtotal: i64) -> i64 {
        if subtotal > self.free_shipping_threshold {
            0
        } else {
            self.flat_shipping_fee
        }
    }
}

/// Everything needed to place an order once its items have been validated.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment: Payment,
    pub notes: Option<String>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub(crate) items: Vec<LineItem>,
    pub(crate) subtotal: i64,
    pub(crate) tax: i64,
    pub(crate) shipping: i64,
    pub(crate) discount: i64,
    pub(crate) total: i64,
    pub shipping_address: ShippingAddress,
    pub payment: Payment,
    pub(crate) status: OrderStatus,
    pub tracking: Option<Tracking>,
    pub(crate) timeline: Vec<TimelineEntry>,
    pub notes: Option<String>,
    pub special_instructions: Option<String>,
    pub(crate) confirmed_at: Option<DateTime<Utc>>,
    pub(crate) shipped_at: Option<DateTime<Utc>>,
    pub(crate) delivered_at: Option<DateTime<Utc>>,
    pub(crate) cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a pending order. `sequence` is the 1-based position of the order
    /// in the store and becomes the order number suffix.
    pub fn place(new: NewOrder, sequence: i64, pricing: &PricingPolicy, now: DateTime<Utc>) -> Self {
        let NewOrder {
            user_id,
            items,
            shipping_address,
            payment,
            notes,
            special_instructions,
        } = new;

        let mut order = Self {
            id: Uuid::new_v4(),
            order_number: order_number(now, sequence),
            user_id,
            items,
            subtotal: 0,
            tax: 0,
            shipping: 0,
            discount: 0,
            total: 0,
            shipping_address,
            payment,
            status: OrderStatus::Pending,
            tracking: None,
            timeline: vec![TimelineEntry {
                status: OrderStatus::Pending,
                message: "Order placed successfully".into(),
                timestamp: now,
                updated_by: None,
            }],
            notes,
            special_instructions,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        order.recalculate();
        order.tax = pricing.tax_for(order.subtotal);
        order.shipping = pricing.shipping_for(order.subtotal);
        order.recalculate();
        order
    }

    /// Moves the order to `target` if the transition table allows it, appends a
    /// timeline entry and stamps the matching date field.
    pub fn update_status(
        &mut self,
        target: OrderStatus,
        message: Option<&str>,
        updated_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        ensure_transition(self.status, target)?;
        if target == OrderStatus::Returned && !self.can_be_returned(now) {
            return Err(AppError::InvalidState(format!(
                "Return window of {RETURN_WINDOW_DAYS} days has closed"
            )));
        }

        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| target.default_message());

        self.status = target;
        self.timeline.push(TimelineEntry {
            status: target,
            message,
            timestamp: now,
            updated_by,
        });
        match target {
            OrderStatus::Confirmed => self.confirmed_at = Some(now),
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Returned => {}
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status.is_cancellable()
    }

    pub fn can_be_returned(&self, now: DateTime<Utc>) -> bool {
        if self.status != OrderStatus::Delivered {
            return false;
        }
        let delivered = self.delivered_at.unwrap_or(self.created_at);
        now - delivered <= Duration::days(RETURN_WINDOW_DAYS)
    }

    pub fn set_tracking(&mut self, tracking: Tracking, now: DateTime<Utc>) {
        self.tracking = Some(tracking);
        self.updated_at = now;
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn subtotal(&self) -> i64 {
        self.subtotal
    }

    pub fn tax(&self) -> i64 {
        self.tax
    }

    pub fn shipping(&self) -> i64 {
        self.shipping
    }

    pub fn discount(&self) -> i64 {
        self.discount
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn total_items(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    fn recalculate(&mut self) {
        for item in &mut self.items {
            item.subtotal = item.price * i64::from(item.quantity);
        }
        self.subtotal = self.items.iter().map(|item| item.subtotal).sum();
        self.total = self.subtotal + self.tax + self.shipping - self.discount;
    }
}

/// `ORD` + unix millis + zero-padded 4-digit sequence.
pub fn order_number(now: DateTime<Utc>, sequence: i64) -> String {
    format!("ORD{}{:04}", now.timestamp_millis(), sequence)
}
