//! Achievement reference persistence (workflow rows).
//!
//! Status changes are predicate updates: each one names the status it
//! expects and returns `None` when the row had already moved on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    AchievementReference, AchievementStatus, PeriodBucket, ReferenceFilter, ReferenceStats,
};
use crate::types::PageRequest;

const COLUMNS: &str = "id, student_id, document_id, status, submitted_at, verified_at, \
                       verified_by, rejection_note, created_at, updated_at";

const JOINED_COLUMNS: &str = "ar.id, ar.student_id, ar.document_id, ar.status, ar.submitted_at, \
                              ar.verified_at, ar.verified_by, ar.rejection_note, ar.created_at, ar.updated_at";

#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn create(
        &self,
        student_id: Uuid,
        document_id: &str,
        status: AchievementStatus,
    ) -> Result<AchievementReference, DatabaseError>;

    /// Ignores rows in `deleted`.
    async fn get_by_document_id(&self, document_id: &str) -> Result<Option<AchievementReference>, DatabaseError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AchievementReference>, DatabaseError>;

    async fn list_by_student(
        &self,
        student_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError>;

    async fn list_by_advisor(
        &self,
        advisor_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError>;

    async fn list_all(
        &self,
        page: PageRequest,
        filter: ReferenceFilter,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError>;

    /// Every live row of the given students, newest first.
    async fn list_by_students(&self, student_ids: &[Uuid]) -> Result<Vec<AchievementReference>, DatabaseError>;

    /// Moves `expected -> status`, optionally stamping `submitted_at`.
    async fn set_status(
        &self,
        id: Uuid,
        expected: AchievementStatus,
        status: AchievementStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Option<AchievementReference>, DatabaseError>;

    /// `submitted -> verified` with `verified_at = now`.
    async fn mark_verified(&self, id: Uuid, verified_by: Uuid) -> Result<Option<AchievementReference>, DatabaseError>;

    /// `submitted -> rejected`.
    async fn mark_rejected(
        &self,
        id: Uuid,
        verified_by: Uuid,
        rejection_note: &str,
    ) -> Result<Option<AchievementReference>, DatabaseError>;

    /// Hard delete for administrative cleanup.
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Totals over live rows, optionally restricted to some students.
    async fn stats(&self, scope: Option<&[Uuid]>) -> Result<ReferenceStats, DatabaseError>;

    /// Live rows created in `[start, end)`, bucketed by day or month.
    async fn count_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: PeriodBucket,
        scope: Option<&[Uuid]>,
    ) -> Result<BTreeMap<String, i64>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn scope_param(scope: Option<&[Uuid]>) -> Option<Vec<Uuid>> {
    scope.map(<[Uuid]>::to_vec)
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn create(
        &self,
        student_id: Uuid,
        document_id: &str,
        status: AchievementStatus,
    ) -> Result<AchievementReference, DatabaseError> {
        let sql = format!(
            "INSERT INTO achievement_references (id, student_id, document_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(document_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_document_id(&self, document_id: &str) -> Result<Option<AchievementReference>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM achievement_references WHERE document_id = $1 AND status <> 'deleted'",
            COLUMNS
        );
        let row = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AchievementReference>, DatabaseError> {
        let sql = format!("SELECT {} FROM achievement_references WHERE id = $1", COLUMNS);
        let row = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_by_student(
        &self,
        student_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM achievement_references WHERE student_id = $1 AND status <> 'deleted'",
        )
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM achievement_references \
             WHERE student_id = $1 AND status <> 'deleted' \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(student_id)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok((rows, total))
    }

    async fn list_by_advisor(
        &self,
        advisor_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM achievement_references ar \
             JOIN students s ON s.id = ar.student_id \
             WHERE s.advisor_id = $1 AND ar.status <> 'deleted'",
        )
        .bind(advisor_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM achievement_references ar \
             JOIN students s ON s.id = ar.student_id \
             WHERE s.advisor_id = $1 AND ar.status <> 'deleted' \
             ORDER BY ar.created_at DESC, ar.id DESC LIMIT $2 OFFSET $3",
            JOINED_COLUMNS
        );
        let rows = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(advisor_id)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok((rows, total))
    }

    async fn list_all(
        &self,
        page: PageRequest,
        filter: ReferenceFilter,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM achievement_references \
             WHERE status <> 'deleted' AND ($1::achievement_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;

        // Column and direction come from closed enums, never from raw input
        let order = filter.sort_order.keyword();
        let sql = format!(
            "SELECT {} FROM achievement_references \
             WHERE status <> 'deleted' AND ($1::achievement_status IS NULL OR status = $1) \
             ORDER BY {} {} NULLS LAST, id {} LIMIT $2 OFFSET $3",
            COLUMNS,
            filter.sort_by.column(),
            order,
            order
        );
        let rows = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(filter.status)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok((rows, total))
    }

    async fn list_by_students(&self, student_ids: &[Uuid]) -> Result<Vec<AchievementReference>, DatabaseError> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM achievement_references \
             WHERE student_id = ANY($1) AND status <> 'deleted' \
             ORDER BY created_at DESC, id DESC",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(student_ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: AchievementStatus,
        status: AchievementStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Option<AchievementReference>, DatabaseError> {
        let sql = format!(
            "UPDATE achievement_references \
             SET status = $3, submitted_at = COALESCE($4, submitted_at), updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(id)
            .bind(expected)
            .bind(status)
            .bind(submitted_at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn mark_verified(&self, id: Uuid, verified_by: Uuid) -> Result<Option<AchievementReference>, DatabaseError> {
        let sql = format!(
            "UPDATE achievement_references \
             SET status = 'verified', verified_by = $2, verified_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'submitted' RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(id)
            .bind(verified_by)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn mark_rejected(
        &self,
        id: Uuid,
        verified_by: Uuid,
        rejection_note: &str,
    ) -> Result<Option<AchievementReference>, DatabaseError> {
        let sql = format!(
            "UPDATE achievement_references \
             SET status = 'rejected', verified_by = $2, rejection_note = $3, updated_at = NOW() \
             WHERE id = $1 AND status = 'submitted' RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, AchievementReference>(&sql)
            .bind(id)
            .bind(verified_by)
            .bind(rejection_note)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM achievement_references WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, scope: Option<&[Uuid]>) -> Result<ReferenceStats, DatabaseError> {
        let (total, verified): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'verified') \
             FROM achievement_references \
             WHERE status <> 'deleted' AND ($1::uuid[] IS NULL OR student_id = ANY($1))",
        )
        .bind(scope_param(scope))
        .fetch_one(&self.pool)
        .await?;
        Ok(ReferenceStats { total, verified })
    }

    async fn count_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: PeriodBucket,
        scope: Option<&[Uuid]>,
    ) -> Result<BTreeMap<String, i64>, DatabaseError> {
        let (unit, format) = match bucket {
            PeriodBucket::Day => ("day", "YYYY-MM-DD"),
            PeriodBucket::Month => ("month", "YYYY-MM"),
        };
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT TO_CHAR(DATE_TRUNC($3, created_at AT TIME ZONE 'UTC'), $4) AS period, COUNT(*) \
             FROM achievement_references \
             WHERE created_at >= $1 AND created_at < $2 AND status <> 'deleted' \
               AND ($5::uuid[] IS NULL OR student_id = ANY($5)) \
             GROUP BY 1 ORDER BY 1",
        )
        .bind(start)
        .bind(end)
        .bind(unit)
        .bind(format)
        .bind(scope_param(scope))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
