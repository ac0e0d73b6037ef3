use std::{env, str::FromStr};

use anyhow::Context;

use crate::order::PricingPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Falls back to the in-memory store when unset.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub pricing: PricingPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            tax_rate_bps: env_or("TAX_RATE_BPS", defaults.tax_rate_bps)?,
            free_shipping_threshold: env_or("FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold)?,
            flat_shipping_fee: env_or("FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?,
        };

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            pricing,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
