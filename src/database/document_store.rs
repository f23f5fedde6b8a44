//! Achievement document persistence.
//!
//! Documents carry the full achievement payload. Soft-deleted documents stay
//! in the collection but every read path filters them out on
//! [`SOFT_DELETE_FIELD`].

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    Achievement, AchievementDetails, AchievementDraft, AchievementPatch, AchievementType,
    Attachment, KeyCount, StudentPoints,
};

pub const COLLECTION: &str = "achievements";

/// Field whose presence marks a document as soft-deleted. Writers and
/// filters must both go through this constant.
pub const SOFT_DELETE_FIELD: &str = "deleted_at";

pub const DEFAULT_TOP_STUDENTS: i64 = 10;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document with a fresh id and both timestamps set to now.
    async fn create(&self, draft: AchievementDraft) -> Result<Achievement, DatabaseError>;

    /// `None` when the id is malformed, unknown or soft-deleted.
    async fn get(&self, id: &str) -> Result<Option<Achievement>, DatabaseError>;

    /// Live documents among `ids`, in no particular order. Malformed ids are skipped.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Achievement>, DatabaseError>;

    /// Applies the present fields and refreshes `updated_at`.
    /// `None` when the document is missing or soft-deleted.
    async fn update(&self, id: &str, patch: &AchievementPatch) -> Result<Option<Achievement>, DatabaseError>;

    /// Sets `deleted_at` and `updated_at`. `false` when nothing live matched.
    async fn soft_delete(&self, id: &str) -> Result<bool, DatabaseError>;

    /// Clears `deleted_at`. Only used to undo a delete that lost its race.
    async fn restore(&self, id: &str) -> Result<bool, DatabaseError>;

    /// Pushes onto `attachments`. `false` when the document is not live.
    async fn append_attachment(&self, id: &str, attachment: &Attachment) -> Result<bool, DatabaseError>;

    /// Live documents of one student, newest first.
    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<Achievement>, DatabaseError>;

    /// Live documents per achievement type. `scope` restricts to the given students.
    async fn count_by_type(&self, scope: Option<&[Uuid]>) -> Result<Vec<KeyCount>, DatabaseError>;

    /// Competition documents per competition level, skipping unset levels.
    async fn count_by_competition_level(&self, scope: Option<&[Uuid]>) -> Result<Vec<KeyCount>, DatabaseError>;

    /// Students ordered by summed points, highest first.
    async fn top_students_by_points(
        &self,
        limit: i64,
        scope: Option<&[Uuid]>,
    ) -> Result<Vec<StudentPoints>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

/// Stored shape of an attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttachmentRecord {
    file_name: String,
    file_url: String,
    file_type: String,
    uploaded_at: bson::DateTime,
}

impl From<&Attachment> for AttachmentRecord {
    fn from(a: &Attachment) -> Self {
        Self {
            file_name: a.file_name.clone(),
            file_url: a.file_url.clone(),
            file_type: a.file_type.clone(),
            uploaded_at: bson::DateTime::from_chrono(a.uploaded_at),
        }
    }
}

impl From<AttachmentRecord> for Attachment {
    fn from(a: AttachmentRecord) -> Self {
        Self {
            file_name: a.file_name,
            file_url: a.file_url,
            file_type: a.file_type,
            uploaded_at: a.uploaded_at.to_chrono(),
        }
    }
}

/// Stored shape of an achievement
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AchievementRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    student_id: String,
    achievement_type: AchievementType,
    title: String,
    description: String,
    #[serde(default)]
    details: AchievementDetails,
    #[serde(default)]
    attachments: Vec<AttachmentRecord>,
    #[serde(default)]
    tags: Vec<String>,
    points: i64,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<bson::DateTime>,
}

impl TryFrom<AchievementRecord> for Achievement {
    type Error = DatabaseError;

    fn try_from(r: AchievementRecord) -> Result<Self, Self::Error> {
        let id = r
            .id
            .ok_or_else(|| DatabaseError::Decode("achievement without _id".to_string()))?;
        let student_id = Uuid::parse_str(&r.student_id)
            .map_err(|e| DatabaseError::Decode(format!("achievement {}: student_id: {}", id, e)))?;

        Ok(Achievement {
            id: id.to_hex(),
            student_id,
            achievement_type: r.achievement_type,
            title: r.title,
            description: r.description,
            details: r.details,
            attachments: r.attachments.into_iter().map(Attachment::from).collect(),
            tags: r.tags,
            points: r.points,
            created_at: r.created_at.to_chrono(),
            updated_at: r.updated_at.to_chrono(),
            deleted_at: r.deleted_at.map(|d| d.to_chrono()),
        })
    }
}

pub struct MongoDocumentStore {
    collection: Collection<AchievementRecord>,
    database: Database,
}

impl MongoDocumentStore {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(COLLECTION),
            database: database.clone(),
        }
    }

    fn live_filter(id: ObjectId) -> Document {
        doc! { "_id": id, SOFT_DELETE_FIELD: { "$exists": false } }
    }

    fn scoped_match(scope: Option<&[Uuid]>) -> Document {
        let mut filter = doc! { SOFT_DELETE_FIELD: { "$exists": false } };
        if let Some(students) = scope {
            let ids: Vec<String> = students.iter().map(Uuid::to_string).collect();
            filter.insert("student_id", doc! { "$in": ids });
        }
        filter
    }

    async fn aggregate_counts(&self, pipeline: Vec<Document>) -> Result<Vec<KeyCount>, DatabaseError> {
        let mut cursor = self.collection.aggregate(pipeline, None).await?;
        let mut counts = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            let key = match row.get("_id") {
                Some(Bson::String(s)) => s.clone(),
                _ => continue,
            };
            counts.push(KeyCount {
                key,
                count: row.get("count").map(bson_as_i64).unwrap_or(0),
            });
        }
        Ok(counts)
    }
}

/// Numeric BSON values come back as Int32, Int64 or Double depending on the server's choice.
fn bson_as_i64(value: &Bson) -> i64 {
    match value {
        Bson::Int32(v) => i64::from(*v),
        Bson::Int64(v) => *v,
        Bson::Double(v) => *v as i64,
        _ => 0,
    }
}

fn parse_object_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn create(&self, draft: AchievementDraft) -> Result<Achievement, DatabaseError> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let mut record = AchievementRecord {
            id: Some(ObjectId::new()),
            student_id: draft.student_id.to_string(),
            achievement_type: draft.achievement_type,
            title: draft.title,
            description: draft.description,
            details: draft.details,
            attachments: Vec::new(),
            tags: draft.tags,
            points: draft.points,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let inserted = self.collection.insert_one(&record, None).await?;
        if let Bson::ObjectId(oid) = inserted.inserted_id {
            record.id = Some(oid);
        }
        Achievement::try_from(record)
    }

    async fn get(&self, id: &str) -> Result<Option<Achievement>, DatabaseError> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };
        self.collection
            .find_one(Self::live_filter(oid), None)
            .await?
            .map(Achievement::try_from)
            .transpose()
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Achievement>, DatabaseError> {
        let oids: Vec<ObjectId> = ids.iter().filter_map(|id| parse_object_id(id)).collect();
        if oids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = doc! { "_id": { "$in": oids }, SOFT_DELETE_FIELD: { "$exists": false } };
        let records: Vec<AchievementRecord> = self.collection.find(filter, None).await?.try_collect().await?;
        records.into_iter().map(Achievement::try_from).collect()
    }

    async fn update(&self, id: &str, patch: &AchievementPatch) -> Result<Option<Achievement>, DatabaseError> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };

        let mut set = doc! { "updated_at": bson::DateTime::from_chrono(Utc::now()) };
        if let Some(t) = patch.achievement_type {
            set.insert("achievement_type", t.as_str());
        }
        if let Some(title) = &patch.title {
            set.insert("title", title.as_str());
        }
        if let Some(description) = &patch.description {
            set.insert("description", description.as_str());
        }
        if let Some(details) = &patch.details {
            set.insert("details", bson::to_bson(details)?);
        }
        if let Some(tags) = &patch.tags {
            set.insert("tags", tags.clone());
        }
        if let Some(points) = patch.points {
            set.insert("points", points);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection
            .find_one_and_update(Self::live_filter(oid), doc! { "$set": set }, options)
            .await?
            .map(Achievement::try_from)
            .transpose()
    }

    async fn soft_delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(false);
        };
        let now = bson::DateTime::from_chrono(Utc::now());
        let result = self
            .collection
            .update_one(
                Self::live_filter(oid),
                doc! { "$set": { SOFT_DELETE_FIELD: now, "updated_at": now } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn restore(&self, id: &str) -> Result<bool, DatabaseError> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(false);
        };
        let result = self
            .collection
            .update_one(
                doc! { "_id": oid, SOFT_DELETE_FIELD: { "$exists": true } },
                doc! {
                    "$unset": { SOFT_DELETE_FIELD: "" },
                    "$set": { "updated_at": bson::DateTime::from_chrono(Utc::now()) },
                },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn append_attachment(&self, id: &str, attachment: &Attachment) -> Result<bool, DatabaseError> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(false);
        };
        let record = bson::to_bson(&AttachmentRecord::from(attachment))?;
        let result = self
            .collection
            .update_one(
                Self::live_filter(oid),
                doc! {
                    "$push": { "attachments": record },
                    "$set": { "updated_at": bson::DateTime::from_chrono(Utc::now()) },
                },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<Achievement>, DatabaseError> {
        let filter = doc! {
            "student_id": student_id.to_string(),
            SOFT_DELETE_FIELD: { "$exists": false },
        };
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let records: Vec<AchievementRecord> = self.collection.find(filter, options).await?.try_collect().await?;
        records.into_iter().map(Achievement::try_from).collect()
    }

    async fn count_by_type(&self, scope: Option<&[Uuid]>) -> Result<Vec<KeyCount>, DatabaseError> {
        let pipeline = vec![
            doc! { "$match": Self::scoped_match(scope) },
            doc! { "$group": { "_id": "$achievement_type", "count": { "$sum": 1 } } },
            doc! { "$sort": { "count": -1, "_id": 1 } },
        ];
        self.aggregate_counts(pipeline).await
    }

    async fn count_by_competition_level(&self, scope: Option<&[Uuid]>) -> Result<Vec<KeyCount>, DatabaseError> {
        let mut filter = Self::scoped_match(scope);
        filter.insert("achievement_type", AchievementType::Competition.as_str());
        filter.insert("details.competition_level", doc! { "$exists": true, "$nin": [Bson::Null, ""] });

        let pipeline = vec![
            doc! { "$match": filter },
            doc! { "$group": { "_id": "$details.competition_level", "count": { "$sum": 1 } } },
            doc! { "$sort": { "count": -1, "_id": 1 } },
        ];
        self.aggregate_counts(pipeline).await
    }

    async fn top_students_by_points(
        &self,
        limit: i64,
        scope: Option<&[Uuid]>,
    ) -> Result<Vec<StudentPoints>, DatabaseError> {
        let limit = if limit <= 0 { DEFAULT_TOP_STUDENTS } else { limit };
        let pipeline = vec![
            doc! { "$match": Self::scoped_match(scope) },
            doc! { "$group": {
                "_id": "$student_id",
                "total_points": { "$sum": "$points" },
                "achievement_count": { "$sum": 1 },
            } },
            doc! { "$sort": { "total_points": -1 } },
            doc! { "$limit": limit },
        ];

        let mut cursor = self.collection.aggregate(pipeline, None).await?;
        let mut top = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            let Some(Bson::String(raw)) = row.get("_id") else {
                continue;
            };
            let student_id = Uuid::parse_str(raw)
                .map_err(|e| DatabaseError::Decode(format!("student_id '{}': {}", raw, e)))?;
            top.push(StudentPoints {
                student_id,
                total_points: row.get("total_points").map(bson_as_i64).unwrap_or(0),
                achievement_count: row.get("achievement_count").map(bson_as_i64).unwrap_or(0),
            });
        }
        Ok(top)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_converts_to_domain_with_hex_id() {
        let oid = ObjectId::new();
        let student = Uuid::new_v4();
        let now = bson::DateTime::now();
        let record = AchievementRecord {
            id: Some(oid),
            student_id: student.to_string(),
            achievement_type: AchievementType::Academic,
            title: "Dean's List".to_string(),
            description: "S1".to_string(),
            details: AchievementDetails::default(),
            attachments: vec![],
            tags: vec![],
            points: 10,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let doc = Achievement::try_from(record).unwrap();
        assert_eq!(doc.id, oid.to_hex());
        assert_eq!(doc.id.len(), 24);
        assert_eq!(doc.student_id, student);
    }

    #[test]
    fn record_with_bad_student_id_is_a_decode_error() {
        let now = bson::DateTime::now();
        let record = AchievementRecord {
            id: Some(ObjectId::new()),
            student_id: "not-a-uuid".to_string(),
            achievement_type: AchievementType::Other,
            title: "t".to_string(),
            description: "d".to_string(),
            details: AchievementDetails::default(),
            attachments: vec![],
            tags: vec![],
            points: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(matches!(Achievement::try_from(record), Err(DatabaseError::Decode(_))));
    }

    #[test]
    fn soft_delete_marker_is_serialized_under_the_filtered_name() {
        let now = bson::DateTime::now();
        let record = AchievementRecord {
            id: None,
            student_id: Uuid::new_v4().to_string(),
            achievement_type: AchievementType::Other,
            title: "t".to_string(),
            description: "d".to_string(),
            details: AchievementDetails::default(),
            attachments: vec![],
            tags: vec![],
            points: 0,
            created_at: now,
            updated_at: now,
            deleted_at: Some(now),
        };
        let stored = bson::to_document(&record).unwrap();
        assert!(stored.contains_key(SOFT_DELETE_FIELD));
        assert!(!stored.contains_key("_id"));
    }

    #[test]
    fn scoped_match_restricts_students() {
        let s = Uuid::new_v4();
        let filter = MongoDocumentStore::scoped_match(Some(&[s]));
        let students = filter.get_document("student_id").unwrap();
        assert_eq!(students.get_array("$in").unwrap().len(), 1);
        assert!(MongoDocumentStore::scoped_match(None).get("student_id").is_none());
    }

    #[test]
    fn numeric_bson_widening() {
        assert_eq!(bson_as_i64(&Bson::Int32(7)), 7);
        assert_eq!(bson_as_i64(&Bson::Int64(9)), 9);
        assert_eq!(bson_as_i64(&Bson::Double(3.0)), 3);
        assert_eq!(bson_as_i64(&Bson::Null), 0);
    }
}
