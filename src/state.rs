use std::sync::Arc;

use crate::{order::PricingPolicy, repository::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pricing: PricingPolicy,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, pricing: PricingPolicy, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            pricing,
            jwt_secret: jwt_secret.into(),
        }
    }
}
