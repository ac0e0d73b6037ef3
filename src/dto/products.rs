use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::models::{ColorStock, Product, ProductStatus, SizeStock};

pub const CATEGORIES: [&str; 9] = [
    "Summer", "Winter", "Formal", "Casual", "Party", "Wedding", "Business", "Vintage", "Cocktail",
];

pub const SIZES: [&str; 6] = ["XS", "S", "M", "L", "XL", "XXL"];

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 2, max = 100, message = "Product name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(length(min = 10, max = 1000, message = "Description must be between 10 and 1000 characters"))]
    pub description: String,
    #[validate(custom(function = "validate_category"))]
    pub category: String,
    #[validate(range(min = 0, message = "Price must be a positive number"))]
    pub price: i64,
    #[validate(range(min = 0, max = 100, message = "Discount must be between 0 and 100"))]
    pub discount: Option<i32>,
    pub image: Option<String>,
    #[validate(length(min = 1, message = "At least one size must be provided"), custom(function = "validate_sizes"))]
    pub sizes: Vec<SizeStock>,
    #[validate(length(min = 1, message = "At least one color must be provided"), custom(function = "validate_colors"))]
    pub colors: Vec<ColorStock>,
    pub status: Option<ProductStatus>,
    pub featured: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 2, max = 100, message = "Product name must be between 2 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 10, max = 1000, message = "Description must be between 10 and 1000 characters"))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_category"))]
    pub category: Option<String>,
    #[validate(range(min = 0, message = "Price must be a positive number"))]
    pub price: Option<i64>,
    #[validate(range(min = 0, max = 100, message = "Discount must be between 0 and 100"))]
    pub discount: Option<i32>,
    pub image: Option<String>,
    pub status: Option<ProductStatus>,
    pub featured: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct RestockRequest {
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// A product plus the values derived from it at response time.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub discounted_price: i64,
    pub total_stock: i32,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            discounted_price: product.discounted_price(),
            total_stock: product.total_stock(),
            product,
        }
    }
}

fn invalid(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

#[allow(clippy::ptr_arg)]
fn validate_category(category: &String) -> Result<(), ValidationError> {
    if CATEGORIES.contains(&category.as_str()) {
        return Ok(());
    }
    Err(invalid("category", "Please select a valid category".into()))
}

#[allow(clippy::ptr_arg)]
fn validate_sizes(sizes: &Vec<SizeStock>) -> Result<(), ValidationError> {
    for (idx, entry) in sizes.iter().enumerate() {
        if !SIZES.contains(&entry.size.as_str()) {
            return Err(invalid("size", format!("Unknown size {}", entry.size)));
        }
        if entry.stock < 0 {
            return Err(invalid("stock", "Stock cannot be negative".into()));
        }
        if sizes[..idx].iter().any(|other| other.size == entry.size) {
            return Err(invalid("duplicate", format!("Size {} is listed twice", entry.size)));
        }
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
fn validate_colors(colors: &Vec<ColorStock>) -> Result<(), ValidationError> {
    for (idx, entry) in colors.iter().enumerate() {
        if entry.name.trim().is_empty() {
            return Err(invalid("color", "Color name is required".into()));
        }
        if entry.stock < 0 {
            return Err(invalid("stock", "Stock cannot be negative".into()));
        }
        if let Some(hex) = &entry.hex_code {
            if !is_hex_color(hex) {
                return Err(invalid("hex_code", "Please enter a valid hex color code".into()));
            }
        }
        if colors[..idx].iter().any(|other| other.name == entry.name) {
            return Err(invalid("duplicate", format!("Color {} is listed twice", entry.name)));
        }
    }
    Ok(())
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|digits| {
            matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateProductRequest {
        CreateProductRequest {
            name: "Linen Shift Dress".into(),
            description: "Breathable linen for long afternoons".into(),
            category: "Summer".into(),
            price: 2499,
            discount: None,
            image: None,
            sizes: vec![SizeStock {
                size: "M".into(),
                stock: 4,
            }],
            colors: vec![ColorStock {
                name: "Sand".into(),
                hex_code: Some("#D2B48C".into()),
                stock: 4,
            }],
            status: None,
            featured: None,
        }
    }

    #[test]
    fn valid_product_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn duplicate_sizes_and_negative_stock_fail() {
        let mut dup = request();
        dup.sizes.push(SizeStock {
            size: "M".into(),
            stock: 1,
        });
        assert!(dup.validate().is_err());

        let mut negative = request();
        negative.colors[0].stock = -1;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn unknown_category_and_bad_hex_fail() {
        let mut bad = request();
        bad.category = "Sportswear".into();
        assert!(bad.validate().is_err());

        let mut hex = request();
        hex.colors[0].hex_code = Some("D2B48C".into());
        assert!(hex.validate().is_err());
        assert!(is_hex_color("#fff"));
    }

    #[test]
    fn discount_is_a_percentage() {
        let mut over = request();
        over.discount = Some(101);
        assert!(over.validate().is_err());

        let update = UpdateProductRequest {
            discount: Some(-5),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
