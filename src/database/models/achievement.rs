use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementType {
    Academic,
    Competition,
    Organization,
    Publication,
    Certification,
    Other,
}

impl AchievementType {
    pub const ALL: [AchievementType; 6] = [
        AchievementType::Academic,
        AchievementType::Competition,
        AchievementType::Organization,
        AchievementType::Publication,
        AchievementType::Certification,
        AchievementType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementType::Academic => "academic",
            AchievementType::Competition => "competition",
            AchievementType::Organization => "organization",
            AchievementType::Publication => "publication",
            AchievementType::Certification => "certification",
            AchievementType::Other => "other",
        }
    }
}

impl fmt::Display for AchievementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("invalid achievement_type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    International,
    National,
    Regional,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationType {
    Journal,
    Conference,
    Book,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Type-specific payload. Every field is optional; which ones matter depends
/// on the achievement type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition_level: Option<CompetitionLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<PublicationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// An achievement document as held by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    /// 12-byte object id, lowercase hex
    pub id: String,
    pub student_id: Uuid,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: AchievementDetails,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Body of `POST /achievements`. Kept loose so the service can report
/// enum and range problems as validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAchievement {
    /// Ignored; the owner is always the calling student.
    #[serde(default, alias = "studentId")]
    pub student_id: Option<String>,
    #[serde(default, alias = "type", alias = "achievementType")]
    pub achievement_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: AchievementDetails,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub points: i64,
}

/// Body of `PATCH /achievements/:id`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AchievementUpdate {
    #[serde(default, alias = "type", alias = "achievementType")]
    pub achievement_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub details: Option<AchievementDetails>,
    pub tags: Option<Vec<String>>,
    pub points: Option<i64>,
}

/// Validated insert handed to the document store
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementDraft {
    pub student_id: Uuid,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    pub details: AchievementDetails,
    pub tags: Vec<String>,
    pub points: i64,
}

/// Validated sparse update handed to the document store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AchievementPatch {
    pub achievement_type: Option<AchievementType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub details: Option<AchievementDetails>,
    pub tags: Option<Vec<String>>,
    pub points: Option<i64>,
}

impl AchievementPatch {
    /// Applies the present fields to `doc` in place.
    pub fn apply_to(&self, doc: &mut Achievement) {
        if let Some(t) = self.achievement_type {
            doc.achievement_type = t;
        }
        if let Some(title) = &self.title {
            doc.title = title.clone();
        }
        if let Some(description) = &self.description {
            doc.description = description.clone();
        }
        if let Some(details) = &self.details {
            doc.details = details.clone();
        }
        if let Some(tags) = &self.tags {
            doc.tags = tags.clone();
        }
        if let Some(points) = self.points {
            doc.points = points;
        }
    }
}

/// `{key, count}` bucket produced by the document aggregations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCount {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPoints {
    pub student_id: Uuid,
    pub total_points: i64,
    pub achievement_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn achievement_type_parses_known_values_only() {
        assert_eq!("competition".parse::<AchievementType>(), Ok(AchievementType::Competition));
        assert!("sports".parse::<AchievementType>().is_err());
        assert!("Academic".parse::<AchievementType>().is_err());
    }

    #[test]
    fn new_achievement_accepts_type_alias() {
        let body: NewAchievement = serde_json::from_value(serde_json::json!({
            "type": "academic",
            "title": "Dean's List",
            "description": "S1",
            "points": 10
        }))
        .unwrap();
        assert_eq!(body.achievement_type, "academic");
        assert_eq!(body.points, 10);
        assert!(body.tags.is_empty());
    }

    #[test]
    fn details_omit_absent_fields() {
        let details = AchievementDetails {
            competition_level: Some(CompetitionLevel::National),
            ..Default::default()
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json, serde_json::json!({"competition_level": "national"}));
    }
}
