pub mod achievement_service;
pub mod error;
pub mod identity;
pub mod notification_service;
pub mod report_service;

use std::sync::Arc;

pub use achievement_service::{AchievementService, AchievementView, Actor, HistoryEntry, ListQuery};
pub use error::{ServiceError, ServiceResult};
pub use identity::{Caller, IdentityResolver};
pub use notification_service::NotificationService;
pub use report_service::ReportService;

use crate::database::{DocumentStore, IdentityStore, NotificationStore, ReferenceStore};

/// The service graph shared by every request handler
#[derive(Clone)]
pub struct Services {
    pub achievements: Arc<AchievementService>,
    pub notifications: Arc<NotificationService>,
    pub reports: Arc<ReportService>,
}

impl Services {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        references: Arc<dyn ReferenceStore>,
        notification_store: Arc<dyn NotificationStore>,
        identity_store: Arc<dyn IdentityStore>,
    ) -> Self {
        let identity = Arc::new(IdentityResolver::new(identity_store.clone()));
        let notifications = Arc::new(NotificationService::new(
            notification_store,
            documents.clone(),
            identity_store,
        ));
        let achievements = Arc::new(AchievementService::new(
            documents.clone(),
            references.clone(),
            identity.clone(),
            notifications.clone(),
        ));
        let reports = Arc::new(ReportService::new(documents, references, identity));

        Self {
            achievements,
            notifications,
            reports,
        }
    }
}
