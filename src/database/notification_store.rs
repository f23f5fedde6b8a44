use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{NewNotification, Notification};
use crate::types::PageRequest;

const COLUMNS: &str = "id, user_id, type, title, message, achievement_id, document_id, \
                       is_read, read_at, created_at, updated_at";

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<Notification, DatabaseError>;

    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Notification>, i64), DatabaseError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, DatabaseError>;

    /// `None` when the notification does not exist or belongs to someone else.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, DatabaseError>;

    /// Returns how many rows changed.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, DatabaseError>;
}

pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, n: NewNotification) -> Result<Notification, DatabaseError> {
        let sql = format!(
            "INSERT INTO notifications (id, user_id, type, title, message, achievement_id, document_id, \
                                        is_read, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NOW(), NOW()) RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(Uuid::new_v4())
            .bind(n.user_id)
            .bind(n.notification_type)
            .bind(n.title)
            .bind(n.message)
            .bind(n.achievement_id)
            .bind(n.document_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_by_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Notification>, i64), DatabaseError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok((rows, total))
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        let sql = format!(
            "UPDATE notifications \
             SET is_read = TRUE, read_at = COALESCE(read_at, NOW()), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW(), updated_at = NOW() \
             WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
