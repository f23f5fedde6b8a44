use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Lecturer, Student};

const STUDENT_SELECT: &str = "SELECT s.id, s.user_id, u.full_name, s.student_id AS student_number, \
                              s.program_study, s.academic_year, s.advisor_id \
                              FROM students s JOIN users u ON u.id = s.user_id";

const LECTURER_SELECT: &str = "SELECT l.id, l.user_id, u.full_name, l.lecturer_id AS lecturer_number, \
                               l.department \
                               FROM lecturers l JOIN users u ON u.id = l.user_id";

/// Read-only lookups over user, role and profile master data
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn role_name(&self, role_id: Uuid) -> Result<Option<String>, DatabaseError>;

    async fn user_full_name(&self, user_id: Uuid) -> Result<Option<String>, DatabaseError>;

    async fn student_by_user(&self, user_id: Uuid) -> Result<Option<Student>, DatabaseError>;

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>, DatabaseError>;

    async fn students_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Student>, DatabaseError>;

    async fn students_by_advisor(&self, advisor_id: Uuid) -> Result<Vec<Student>, DatabaseError>;

    async fn lecturer_by_user(&self, user_id: Uuid) -> Result<Option<Lecturer>, DatabaseError>;

    async fn lecturer_by_id(&self, id: Uuid) -> Result<Option<Lecturer>, DatabaseError>;
}

pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn role_name(&self, role_id: Uuid) -> Result<Option<String>, DatabaseError> {
        let name = sqlx::query_scalar("SELECT name FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn user_full_name(&self, user_id: Uuid) -> Result<Option<String>, DatabaseError> {
        let name = sqlx::query_scalar("SELECT full_name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn student_by_user(&self, user_id: Uuid) -> Result<Option<Student>, DatabaseError> {
        let sql = format!("{} WHERE s.user_id = $1", STUDENT_SELECT);
        let row = sqlx::query_as::<_, Student>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>, DatabaseError> {
        let sql = format!("{} WHERE s.id = $1", STUDENT_SELECT);
        let row = sqlx::query_as::<_, Student>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn students_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Student>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("{} WHERE s.id = ANY($1)", STUDENT_SELECT);
        let rows = sqlx::query_as::<_, Student>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn students_by_advisor(&self, advisor_id: Uuid) -> Result<Vec<Student>, DatabaseError> {
        let sql = format!("{} WHERE s.advisor_id = $1 ORDER BY u.full_name", STUDENT_SELECT);
        let rows = sqlx::query_as::<_, Student>(&sql)
            .bind(advisor_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn lecturer_by_user(&self, user_id: Uuid) -> Result<Option<Lecturer>, DatabaseError> {
        let sql = format!("{} WHERE l.user_id = $1", LECTURER_SELECT);
        let row = sqlx::query_as::<_, Lecturer>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn lecturer_by_id(&self, id: Uuid) -> Result<Option<Lecturer>, DatabaseError> {
        let sql = format!("{} WHERE l.id = $1", LECTURER_SELECT);
        let row = sqlx::query_as::<_, Lecturer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
