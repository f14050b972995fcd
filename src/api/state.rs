use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<StorageClient>,
    pub metrics: Arc<Metrics>,
    /// Value of the `X-Serve-From` header
    pub serve_from: Arc<str>,
}

impl AppState {
    pub fn new(config: Config, storage: StorageClient) -> Self {
        let serve_from: Arc<str> = config
            .server
            .serve_from
            .as_deref()
            .unwrap_or("localhost")
            .into();
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            metrics: Arc::new(Metrics::new()),
            serve_from,
        }
    }
}
