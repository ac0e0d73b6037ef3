use anyhow::Context;
use chrono::Duration;
use dress_store_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    middleware::auth::{Role, issue_token},
    repository::{CatalogStore, postgres::PgStore},
    seed::demo_products,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set")?;

    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    let store = PgStore::new(pool);

    for product in demo_products() {
        if store.find_product_by_slug(&product.slug).await?.is_some() {
            println!("Skipped {} (already present)", product.slug);
            continue;
        }
        store.insert_product(&product).await?;
        println!("Seeded {}", product.slug);
    }

    let ttl = Duration::days(7);
    let admin_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    let admin_token = issue_token(&config.jwt_secret, admin_id, Role::Admin, ttl)?;
    let customer_token = issue_token(&config.jwt_secret, customer_id, Role::User, ttl)?;

    println!("Seed completed.");
    println!("Admin    {admin_id}\n  Bearer {admin_token}");
    println!("Customer {customer_id}\n  Bearer {customer_token}");
    Ok(())
}
