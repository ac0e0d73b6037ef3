use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    lifecycle::OrderStatus,
    models::{PaymentMethod, ShippingAddress, Tracking},
    order::Order,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"), nested)]
    pub items: Vec<OrderItemRequest>,
    #[validate(nested)]
    pub shipping_address: ShippingAddressRequest,
    pub payment: PaymentRequest,
    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "Special instructions cannot exceed 500 characters"))]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressRequest {
    #[validate(length(min = 2, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 2, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(min = 5, message = "Street address is required"))]
    pub street: String,
    #[validate(length(min = 2, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 2, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 5, message = "Valid zip code is required"))]
    pub zip_code: String,
    pub country: Option<String>,
}

impl ShippingAddressRequest {
    pub fn into_address(self) -> ShippingAddress {
        ShippingAddress {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip_code: self.zip_code.trim().to_string(),
            country: self
                .country
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "India".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
}

/// 7 to 15 digits, optionally with a leading `+` and spaces or dashes.
#[allow(clippy::ptr_arg)]
fn validate_phone(phone: &String) -> Result<(), ValidationError> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let well_formed = body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    let digits = body.chars().filter(char::is_ascii_digit).count();
    if well_formed && (7..=15).contains(&digits) {
        return Ok(());
    }
    let mut err = ValidationError::new("phone");
    err.message = Some("Valid phone number is required".into());
    Err(err)
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 500, message = "Message cannot exceed 500 characters"))]
    pub message: Option<String>,
    pub tracking: Option<Tracking>,
}

/// An order plus the values derived from it at response time.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub total_items: i64,
    pub age_in_days: i64,
    pub can_be_cancelled: bool,
    pub can_be_returned: bool,
}

impl OrderResponse {
    pub fn new(order: Order, now: DateTime<Utc>) -> Self {
        Self {
            total_items: order.total_items(),
            age_in_days: order.age_in_days(now),
            can_be_cancelled: order.can_be_cancelled(),
            can_be_returned: order.can_be_returned(now),
            order,
        }
    }
}
