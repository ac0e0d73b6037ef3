use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        orders::{
            CreateOrderRequest, OrderItemRequest, OrderResponse, PaymentRequest,
            ShippingAddressRequest, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductResponse, RestockRequest, UpdateProductRequest},
    },
    error::FieldError,
    lifecycle::OrderStatus,
    middleware::auth::Role,
    models::{
        ColorStock, LineItem, Payment, PaymentMethod, PaymentStatus, Product, ProductSort,
        ProductStatus, ShippingAddress, SizeStock, TimelineEntry, Tracking,
    },
    order::Order,
    response::{ApiResponse, Meta},
    routes::{admin, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::featured_products,
        products::list_categories,
        products::products_by_category,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        orders::list_all_orders,
        orders::update_order_status,
        admin::restock,
    ),
    components(
        schemas(
            Product,
            ProductResponse,
            ProductStatus,
            ProductSort,
            SizeStock,
            ColorStock,
            Order,
            OrderStatus,
            LineItem,
            Payment,
            PaymentMethod,
            PaymentStatus,
            ShippingAddress,
            Tracking,
            TimelineEntry,
            Role,
            OrderResponse,
            CreateOrderRequest,
            OrderItemRequest,
            ShippingAddressRequest,
            PaymentRequest,
            UpdateOrderStatusRequest,
            CreateProductRequest,
            UpdateProductRequest,
            RestockRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LimitQuery,
            FieldError,
            Meta,
            ApiResponse<ProductResponse>,
            ApiResponse<Vec<ProductResponse>>,
            ApiResponse<Vec<String>>,
            ApiResponse<OrderResponse>,
            ApiResponse<Vec<OrderResponse>>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Dress catalog"),
        (name = "Orders", description = "Placing, viewing and cancelling orders"),
        (name = "Admin", description = "Order lifecycle and inventory administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
