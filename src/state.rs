use std::{sync::Arc, time::Instant};

use crate::{
    application::{
        lifecycle::LifecycleManager, metrics::RequestMetrics,
        preferences_service::PreferencesService,
    },
    infrastructure::PreferencesRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub preferences: Arc<PreferencesService>,
    pub lifecycle: Arc<LifecycleManager>,
    pub metrics: Arc<RequestMetrics>,
    pub repository: Arc<dyn PreferencesRepository>,
    pub admin_password: Arc<str>,
    pub store_kind: &'static str,
    pub started_at: Instant,
    /// Upper bound for bodies buffered by middleware.
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn PreferencesRepository>,
        lifecycle: Arc<LifecycleManager>,
        admin_password: impl Into<Arc<str>>,
        store_kind: &'static str,
    ) -> Self {
        Self {
            preferences: Arc::new(PreferencesService::new(repository.clone())),
            lifecycle,
            metrics: Arc::new(RequestMetrics::new()),
            repository,
            admin_password: admin_password.into(),
            store_kind,
            started_at: Instant::now(),
            max_body_bytes: usize::MAX,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}
