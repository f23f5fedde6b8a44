use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "achievement_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AchievementStatus {
    Draft,
    Submitted,
    Verified,
    Rejected,
    Deleted,
}

impl AchievementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementStatus::Draft => "draft",
            AchievementStatus::Submitted => "submitted",
            AchievementStatus::Verified => "verified",
            AchievementStatus::Rejected => "rejected",
            AchievementStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(AchievementStatus::Draft),
            "submitted" => Ok(AchievementStatus::Submitted),
            "verified" => Ok(AchievementStatus::Verified),
            "rejected" => Ok(AchievementStatus::Rejected),
            "deleted" => Ok(AchievementStatus::Deleted),
            other => Err(format!("invalid status '{}'", other)),
        }
    }
}

/// Workflow row linking a student to an achievement document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AchievementReference {
    pub id: Uuid,
    pub student_id: Uuid,
    pub document_id: String,
    pub status: AchievementStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
    pub rejection_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns the admin listing may sort on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    SubmittedAt,
    Status,
}

impl SortField {
    /// Unknown names fall back to `created_at`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("updated_at") => SortField::UpdatedAt,
            Some("submitted_at") => SortField::SubmittedAt,
            Some("status") => SortField::Status,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::SubmittedAt => "submitted_at",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("ASC") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Admin listing filter; deleted rows are never listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceFilter {
    pub status: Option<AchievementStatus>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub total: i64,
    pub verified: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodBucket {
    Day,
    Month,
}

impl PeriodBucket {
    pub fn key(&self, at: DateTime<Utc>) -> String {
        match self {
            PeriodBucket::Day => at.format("%Y-%m-%d").to_string(),
            PeriodBucket::Month => at.format("%Y-%m").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sort_params_fall_back_to_defaults() {
        assert_eq!(SortField::from_param(Some("submitted_at")), SortField::SubmittedAt);
        assert_eq!(SortField::from_param(Some("id; DROP TABLE x")), SortField::CreatedAt);
        assert_eq!(SortField::from_param(None), SortField::CreatedAt);
        assert_eq!(SortOrder::from_param(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::from_param(Some("sideways")), SortOrder::Desc);
    }

    #[test]
    fn period_keys() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(PeriodBucket::Day.key(at), "2024-03-07");
        assert_eq!(PeriodBucket::Month.key(at), "2024-03");
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ["draft", "submitted", "verified", "rejected", "deleted"] {
            assert_eq!(s.parse::<AchievementStatus>().unwrap().as_str(), s);
        }
        assert!("archived".parse::<AchievementStatus>().is_err());
    }
}
