use std::sync::Arc;

use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::{AchievementReference, NewNotification, Notification, NotificationType};
use crate::database::{DocumentStore, IdentityStore, NotificationStore};
use crate::types::{Page, PageRequest, Pagination};

const FALLBACK_TITLE: &str = "Prestasi";

/// Writes workflow notifications and serves the recipient's inbox
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    documents: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityStore>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            store,
            documents,
            identity,
        }
    }

    async fn document_title(&self, reference: &AchievementReference) -> String {
        match self.documents.get(&reference.document_id).await {
            Ok(Some(doc)) if !doc.title.trim().is_empty() => doc.title,
            Ok(_) => FALLBACK_TITLE.to_string(),
            Err(e) => {
                tracing::warn!(document_id = %reference.document_id, error = %e, "title lookup failed");
                FALLBACK_TITLE.to_string()
            }
        }
    }

    /// Tells the owning student's advisor that a draft was submitted.
    /// A student without an advisor is not an error; nothing is written.
    pub async fn notify_submitted(&self, reference: &AchievementReference) -> ServiceResult<Option<Notification>> {
        let Some(student) = self.identity.student_by_id(reference.student_id).await? else {
            tracing::debug!(student_id = %reference.student_id, "no student profile, skipping submission notice");
            return Ok(None);
        };
        let Some(advisor_id) = student.advisor_id else {
            return Ok(None);
        };
        let Some(lecturer) = self.identity.lecturer_by_id(advisor_id).await? else {
            tracing::debug!(%advisor_id, "advisor has no lecturer profile, skipping submission notice");
            return Ok(None);
        };

        let title = self.document_title(reference).await;
        let notification = self
            .store
            .create(NewNotification {
                user_id: lecturer.user_id,
                notification_type: NotificationType::AchievementSubmitted,
                title: "Prestasi Baru Diajukan".to_string(),
                message: format!(
                    "Mahasiswa bimbingan Anda telah mengajukan prestasi \"{}\" untuk diverifikasi.",
                    title
                ),
                achievement_id: Some(reference.id),
                document_id: Some(reference.document_id.clone()),
            })
            .await?;
        Ok(Some(notification))
    }

    /// Tells the owning student why their submission was rejected.
    pub async fn notify_rejected(&self, reference: &AchievementReference, note: &str) -> ServiceResult<Notification> {
        let student = self
            .identity
            .student_by_id(reference.student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("student for rejected achievement not found"))?;

        let title = self.document_title(reference).await;
        let notification = self
            .store
            .create(NewNotification {
                user_id: student.user_id,
                notification_type: NotificationType::AchievementRejected,
                title: "Prestasi Ditolak".to_string(),
                message: format!("Prestasi \"{}\" telah ditolak dengan catatan: {}", title, note),
                achievement_id: Some(reference.id),
                document_id: Some(reference.document_id.clone()),
            })
            .await?;
        Ok(notification)
    }

    pub async fn list(&self, user_id: Uuid, page: PageRequest) -> ServiceResult<Page<Notification>> {
        let (items, total) = self.store.list_by_user(user_id, page).await?;
        Ok(Page {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn unread_count(&self, user_id: Uuid) -> ServiceResult<i64> {
        Ok(self.store.unread_count(user_id).await?)
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> ServiceResult<Notification> {
        self.store
            .mark_read(id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("notification not found"))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> ServiceResult<u64> {
        Ok(self.store.mark_all_read(user_id).await?)
    }
}
