use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{DocumentStore, IdentityStore, NotificationStore, ReferenceStore};
use crate::services::Services;

/// Shared by every handler through axum's `State` extractor
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Services,
    /// Held for health checks
    pub documents: Arc<dyn DocumentStore>,
    pub references: Arc<dyn ReferenceStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        documents: Arc<dyn DocumentStore>,
        references: Arc<dyn ReferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        let services = Services::new(documents.clone(), references.clone(), notifications, identity);
        Self {
            config: Arc::new(config),
            services,
            documents,
            references,
        }
    }
}
