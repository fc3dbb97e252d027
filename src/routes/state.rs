use std::sync::Arc;

use crate::{db::Store, services::CatalogProvider};

/// Shared handles every handler reaches through `State<Arc<AppState>>`
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub catalog: Arc<dyn CatalogProvider>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<dyn CatalogProvider>) -> Self {
        Self { store, catalog }
    }
}
