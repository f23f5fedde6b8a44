use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Student profile joined with the owning user's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    /// Institutional student number
    pub student_number: String,
    pub program_study: Option<String>,
    pub academic_year: Option<String>,
    pub advisor_id: Option<Uuid>,
}

/// Lecturer profile joined with the owning user's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Lecturer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    /// Institutional lecturer number
    pub lecturer_number: String,
    pub department: Option<String>,
}
