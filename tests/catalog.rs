mod common;

use common::{admin, customer, dress};
use dress_store_api::{
    dto::products::ProductResponse,
    error::AppError,
    models::{ProductSort, ProductStatus},
    response::ApiResponse,
    routes::params::{LimitQuery, ProductQuery},
    services::product_service,
};

fn names(resp: &ApiResponse<Vec<ProductResponse>>) -> Vec<String> {
    resp.data
        .as_ref()
        .map(|items| items.iter().map(|p| p.product.name.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn unpublished_products_are_hidden_from_shoppers() -> anyhow::Result<()> {
    let live = dress("Live Dress", 1000, &[("M", 2)], &[("Red", 2)]);
    let mut draft = dress("Draft Dress", 1000, &[("M", 2)], &[("Red", 2)]);
    draft.status = ProductStatus::Draft;
    let mut retired = dress("Retired Dress", 1000, &[("M", 2)], &[("Red", 2)]);
    retired.status = ProductStatus::Inactive;
    let (state, _store) = common::memory_state(vec![live, draft.clone(), retired]).await;

    let public = product_service::list_products(&state, None, ProductQuery::default()).await?;
    assert_eq!(names(&public), vec!["Live Dress"]);
    assert_eq!(public.total, Some(1));

    let shopper = customer();
    let err = product_service::list_products(
        &state,
        Some(&shopper),
        ProductQuery {
            status: Some(ProductStatus::Draft),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let staff = admin();
    let everything = product_service::list_products(&state, Some(&staff), ProductQuery::default()).await?;
    assert_eq!(everything.total, Some(3));
    let drafts = product_service::list_products(
        &state,
        Some(&staff),
        ProductQuery {
            status: Some(ProductStatus::Draft),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(names(&drafts), vec!["Draft Dress"]);

    let hidden = product_service::get_product(&state, None, &draft.slug)
        .await
        .unwrap_err();
    assert!(matches!(hidden, AppError::NotFound(_)));
    let shown = product_service::get_product(&state, Some(&staff), &draft.slug).await?;
    assert_eq!(shown.data.expect("product").product.id, draft.id);
    Ok(())
}

#[tokio::test]
async fn price_variant_filters_and_sorting() -> anyhow::Result<()> {
    let cheap = dress("Cotton Shift", 900, &[("S", 2)], &[("White", 2)]);
    let mid = dress("Boho Maxi", 1900, &[("M", 2)], &[("Red", 2)]);
    let dear = dress("Silk Gown", 5900, &[("L", 2), ("M", 1)], &[("Black", 2)]);
    let (state, _store) = common::memory_state(vec![cheap, mid, dear]).await;

    let ranged = product_service::list_products(
        &state,
        None,
        ProductQuery {
            min_price: Some(1000),
            max_price: Some(6000),
            sort: Some(ProductSort::PriceAsc),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(names(&ranged), vec!["Boho Maxi", "Silk Gown"]);

    let by_size = product_service::list_products(
        &state,
        None,
        ProductQuery {
            sizes: Some("M, XL".into()),
            sort: Some(ProductSort::NameDesc),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(names(&by_size), vec!["Silk Gown", "Boho Maxi"]);

    let by_color = product_service::list_products(
        &state,
        None,
        ProductQuery {
            colors: Some("White,Black".into()),
            sort: Some(ProductSort::PriceDesc),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(names(&by_color), vec!["Silk Gown", "Cotton Shift"]);

    let by_name = product_service::list_products(
        &state,
        None,
        ProductQuery {
            sort: Some(ProductSort::NameAsc),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(names(&by_name), vec!["Boho Maxi", "Cotton Shift", "Silk Gown"]);

    let inverted = product_service::list_products(
        &state,
        None,
        ProductQuery {
            min_price: Some(5000),
            max_price: Some(100),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(inverted, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn featured_categories_and_discounts() -> anyhow::Result<()> {
    let mut star = dress("Star Dress", 2000, &[("M", 2)], &[("Red", 2)]);
    star.featured = true;
    star.discount = 25;
    star.category = "Party".into();
    let mut hidden_star = dress("Hidden Star", 2000, &[("M", 2)], &[("Red", 2)]);
    hidden_star.featured = true;
    hidden_star.status = ProductStatus::Draft;
    hidden_star.category = "Wedding".into();
    let plain = dress("Plain Dress", 1000, &[("M", 2)], &[("Red", 2)]);
    let (state, _store) = common::memory_state(vec![star, hidden_star, plain]).await;

    let featured = product_service::featured_products(&state, LimitQuery::default()).await?;
    assert_eq!(featured.count, Some(1));
    let first = &featured.data.as_ref().expect("products")[0];
    assert_eq!(first.product.name, "Star Dress");
    assert_eq!(first.discounted_price, 1500);
    assert_eq!(first.total_stock, 2);

    let categories = product_service::categories(&state).await?;
    assert_eq!(categories.data, Some(vec!["Party".to_string(), "Summer".to_string()]));

    let party = product_service::products_by_category(&state, "Party", LimitQuery::default()).await?;
    assert_eq!(names(&party), vec!["Star Dress"]);
    let wedding = product_service::products_by_category(&state, "Wedding", LimitQuery::default()).await?;
    assert_eq!(wedding.count, Some(0));
    Ok(())
}

#[tokio::test]
async fn deleting_a_product_retires_it() -> anyhow::Result<()> {
    let product = dress("Going Away", 1500, &[("M", 2)], &[("Red", 2)]);
    let (state, store) = common::memory_state(vec![product.clone()]).await;

    let denied = product_service::delete_product(&state, &customer(), product.id)
        .await
        .unwrap_err();
    assert!(matches!(denied, AppError::Forbidden));

    let staff = admin();
    let deleted = product_service::delete_product(&state, &staff, product.id)
        .await?
        .data
        .expect("product");
    assert_eq!(deleted.product.status, ProductStatus::Inactive);

    let public = product_service::list_products(&state, None, ProductQuery::default()).await?;
    assert_eq!(public.total, Some(0));
    assert!(
        store
            .audit_entries()
            .await
            .iter()
            .any(|e| e.action == "product_deleted")
    );
    Ok(())
}
