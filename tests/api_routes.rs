mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use common::{admin, customer, dress, memory_state, token_for};
use dress_store_api::{models::Product, routes::create_app};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app_with(products: Vec<Product>) -> Router {
    let (state, _store) = memory_state(products).await;
    create_app(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn order_body(product: &Product, quantity: i32) -> Value {
    json!({
        "items": [{ "product": product.id, "quantity": quantity, "size": "M", "color": "Red" }],
        "shippingAddress": {
            "firstName": "John",
            "lastName": "Doe",
            "email": "john@example.com",
            "phone": "9876543211",
            "street": "123 Main Street",
            "city": "Mumbai",
            "state": "Maharashtra",
            "zipCode": "400001"
        },
        "payment": { "method": "upi", "transactionId": "UPI-42" }
    })
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let app = app_with(vec![]).await;

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = send(&app, get("/api/nowhere", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn order_routes_require_a_token() {
    let app = app_with(vec![]).await;

    let (status, body) = send(&app, get("/api/orders", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, get("/api/orders", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_order_body_reports_field_errors() {
    let app = app_with(vec![]).await;
    let token = token_for(&customer());

    let body = json!({
        "items": [],
        "shippingAddress": {
            "firstName": "John",
            "lastName": "Doe",
            "email": "nope",
            "phone": "9876543211",
            "street": "123 Main Street",
            "city": "Mumbai",
            "state": "Maharashtra",
            "zipCode": "400001"
        },
        "payment": { "method": "cod" }
    });
    let (status, body) = send(&app, with_json("POST", "/api/orders", &token, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let fields: Vec<&str> = body["errors"]
        .as_array()
        .expect("errors")
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"items"), "{fields:?}");
    assert!(fields.contains(&"shippingAddress.email"), "{fields:?}");

    let bad_method = json!({ "items": [], "payment": { "method": "barter" } });
    let (status, body) = send(&app, with_json("POST", "/api/orders", &token, bad_method)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "body");
}

#[tokio::test]
async fn order_lifecycle_over_http() {
    let product = dress("Floral Midi", 2499, &[("M", 3)], &[("Red", 5)]);
    let app = app_with(vec![product.clone()]).await;
    let owner = customer();
    let owner_token = token_for(&owner);
    let stranger_token = token_for(&customer());
    let admin_token = token_for(&admin());

    let (status, body) = send(
        &app,
        with_json("POST", "/api/orders", &owner_token, order_body(&product, 1)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["subtotal"], 2499);
    assert_eq!(body["data"]["shipping"], 0);
    assert_eq!(body["data"]["payment"]["status"], "completed");
    assert_eq!(body["data"]["totalItems"], 1);
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, _) = send(&app, get(&format!("/api/orders/{id}"), Some(&stranger_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, get(&format!("/api/orders/{id}"), Some(&owner_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orderNumber"].as_str().map(|n| n.starts_with("ORD")), Some(true));

    let status_uri = format!("/api/orders/{id}/status");
    let (status, _) = send(
        &app,
        with_json("PUT", &status_uri, &owner_token, json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        with_json("PUT", &status_uri, &admin_token, json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app,
        with_json("PUT", &status_uri, &admin_token, json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["timeline"].as_array().map(Vec::len), Some(2));

    let cancel_uri = format!("/api/orders/{id}/cancel");
    let (status, body) = send(&app, with_json("PUT", &cancel_uri, &owner_token, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (status, _) = send(&app, with_json("PUT", &cancel_uri, &owner_token, json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, get(&format!("/api/products/{}", product.slug), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sizes"][0]["stock"], 3);
    assert_eq!(body["data"]["colors"][0]["stock"], 5);
}

#[tokio::test]
async fn out_of_stock_is_a_bad_request() {
    let product = dress("Only Two", 400, &[("M", 2)], &[("Red", 2)]);
    let app = app_with(vec![product.clone()]).await;
    let token = token_for(&customer());

    let (status, body) = send(
        &app,
        with_json("POST", "/api/orders", &token, order_body(&product, 3)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Product Only Two is out of stock for size M and color Red"
    );
}

#[tokio::test]
async fn admin_listing_and_catalog_management() {
    let product = dress("Boho Maxi", 1999, &[("M", 4)], &[("Red", 4)]);
    let app = app_with(vec![product.clone()]).await;
    let user_token = token_for(&customer());
    let admin_token = token_for(&admin());

    let (status, _) = send(&app, get("/api/orders/admin/all", Some(&user_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    send(
        &app,
        with_json("POST", "/api/orders", &user_token, order_body(&product, 1)),
    )
    .await;
    let (status, body) = send(&app, get("/api/orders/admin/all", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["pagination"]["limit"], 20);

    let new_product = json!({
        "name": "Velvet Cocktail Dress",
        "description": "Deep velvet for winter evenings",
        "category": "Cocktail",
        "price": 4599,
        "sizes": [{ "size": "S", "stock": 2 }],
        "colors": [{ "name": "Wine", "hexCode": "#722F37", "stock": 2 }]
    });
    let (status, _) = send(
        &app,
        with_json("POST", "/api/products", &user_token, new_product.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        with_json("POST", "/api/products", &admin_token, new_product),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["slug"], "velvet-cocktail-dress");

    let restock_uri = format!("/api/admin/inventory/{}/restock", product.id);
    let (status, body) = send(
        &app,
        with_json(
            "PATCH",
            &restock_uri,
            &admin_token,
            json!({ "size": "M", "color": "Red", "quantity": 6 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sizes"][0]["stock"], 9);

    let (status, body) = send(&app, get("/api/products?category=Cocktail", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn public_catalog_hides_unpublished_products() {
    let live = dress("Garden Party Dress", 2999, &[("M", 2)], &[("Red", 2)]);
    let mut draft = dress("Secret Sample", 2999, &[("M", 2)], &[("Red", 2)]);
    draft.status = dress_store_api::models::ProductStatus::Draft;
    draft.featured = true;
    let app = app_with(vec![live.clone(), draft.clone()]).await;
    let admin_token = token_for(&admin());

    let (status, body) = send(&app, get("/api/products", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["slug"], live.slug);
    assert_eq!(body["data"][0]["discountedPrice"], 2999);

    let (status, _) = send(&app, get("/api/products?status=draft", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, get("/api/products", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/api/products?status=draft", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, _) = send(&app, get(&format!("/api/products/{}", draft.slug), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/products/featured", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, body) = send(&app, get("/api/products/categories", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["Summer"]));

    let (status, body) = send(
        &app,
        get("/api/products?minPrice=100&maxPrice=5000&sizes=M&sort=price_desc", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn deleting_a_product_over_http() {
    let product = dress("Retiring Dress", 1999, &[("M", 2)], &[("Red", 2)]);
    let app = app_with(vec![product.clone()]).await;
    let uri = format!("/api/products/{}", product.id);

    let delete = |token: &str| {
        Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, delete(&token_for(&customer()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, delete(&token_for(&admin()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "inactive");

    let (status, _) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
