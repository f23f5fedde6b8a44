//! In-memory stores and seeding helpers for service and HTTP tests.
//!
//! The stores honour the same contracts as the Mongo and Postgres
//! implementations (soft-delete filtering, predicate status updates,
//! newest-first listing) and can be told to fail their next write.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::document_store::DEFAULT_TOP_STUDENTS;
use crate::database::models::{
    Achievement, AchievementDraft, AchievementPatch, AchievementReference, AchievementStatus,
    AchievementType, Attachment, KeyCount, Lecturer, NewNotification, Notification, PeriodBucket,
    ReferenceFilter, ReferenceStats, SortField, SortOrder, Student, StudentPoints,
};
use crate::database::{DatabaseError, DocumentStore, IdentityStore, NotificationStore, ReferenceStore};
use crate::services::{Actor, Services};
use crate::state::AppState;
use crate::types::PageRequest;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Strictly increasing timestamps so newest-first ordering is deterministic
#[derive(Default)]
struct Clock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl Clock {
    fn tick(&self) -> DateTime<Utc> {
        let mut last = lock(&self.last);
        let now = Utc::now();
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

fn injected(flag: &AtomicBool, what: &str) -> Result<(), DatabaseError> {
    if flag.swap(false, Ordering::SeqCst) {
        return Err(DatabaseError::Unavailable(format!("injected {} failure", what)));
    }
    Ok(())
}

fn paginate<T>(rows: Vec<T>, page: PageRequest) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(page.offset().max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect();
    (items, total)
}

fn in_scope(student_id: Uuid, scope: Option<&[Uuid]>) -> bool {
    scope.map_or(true, |ids| ids.contains(&student_id))
}

fn sorted_counts(counts: HashMap<String, i64>) -> Vec<KeyCount> {
    let mut out: Vec<KeyCount> = counts.into_iter().map(|(key, count)| KeyCount { key, count }).collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    out
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<Vec<Achievement>>,
    clock: Clock,
    fail_soft_delete: AtomicBool,
}

impl MemoryDocumentStore {
    /// Every stored document, soft-deleted ones included
    pub fn all(&self) -> Vec<Achievement> {
        lock(&self.docs).clone()
    }

    pub fn raw(&self, id: &str) -> Option<Achievement> {
        lock(&self.docs).iter().find(|d| d.id == id).cloned()
    }

    /// Soft-deletes behind the service's back.
    pub fn hide(&self, id: &str) {
        let now = self.clock.tick();
        if let Some(doc) = lock(&self.docs).iter_mut().find(|d| d.id == id) {
            doc.deleted_at = Some(now);
        }
    }

    pub fn fail_next_soft_delete(&self) {
        self.fail_soft_delete.store(true, Ordering::SeqCst);
    }

    fn live(&self) -> Vec<Achievement> {
        lock(&self.docs).iter().filter(|d| d.deleted_at.is_none()).cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, draft: AchievementDraft) -> Result<Achievement, DatabaseError> {
        let now = self.clock.tick();
        let doc = Achievement {
            id: ObjectId::new().to_hex(),
            student_id: draft.student_id,
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
        lock(&self.docs).push(doc.clone());
        Ok(doc)
    }

    async fn get(&self, id: &str) -> Result<Option<Achievement>, DatabaseError> {
        Ok(self.live().into_iter().find(|d| d.id == id))
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Achievement>, DatabaseError> {
        Ok(self.live().into_iter().filter(|d| ids.contains(&d.id)).collect())
    }

    async fn update(&self, id: &str, patch: &AchievementPatch) -> Result<Option<Achievement>, DatabaseError> {
        let now = self.clock.tick();
        let mut docs = lock(&self.docs);
        let Some(doc) = docs.iter_mut().find(|d| d.id == id && d.deleted_at.is_none()) else {
            return Ok(None);
        };
        patch.apply_to(doc);
        doc.updated_at = now;
        Ok(Some(doc.clone()))
    }

    async fn soft_delete(&self, id: &str) -> Result<bool, DatabaseError> {
        injected(&self.fail_soft_delete, "soft delete")?;
        let now = self.clock.tick();
        let mut docs = lock(&self.docs);
        match docs.iter_mut().find(|d| d.id == id && d.deleted_at.is_none()) {
            Some(doc) => {
                doc.deleted_at = Some(now);
                doc.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn restore(&self, id: &str) -> Result<bool, DatabaseError> {
        let now = self.clock.tick();
        let mut docs = lock(&self.docs);
        match docs.iter_mut().find(|d| d.id == id && d.deleted_at.is_some()) {
            Some(doc) => {
                doc.deleted_at = None;
                doc.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_attachment(&self, id: &str, attachment: &Attachment) -> Result<bool, DatabaseError> {
        let now = self.clock.tick();
        let mut docs = lock(&self.docs);
        match docs.iter_mut().find(|d| d.id == id && d.deleted_at.is_none()) {
            Some(doc) => {
                doc.attachments.push(attachment.clone());
                doc.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<Achievement>, DatabaseError> {
        let mut docs: Vec<Achievement> = self.live().into_iter().filter(|d| d.student_id == student_id).collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn count_by_type(&self, scope: Option<&[Uuid]>) -> Result<Vec<KeyCount>, DatabaseError> {
        let mut counts = HashMap::new();
        for doc in self.live().iter().filter(|d| in_scope(d.student_id, scope)) {
            *counts.entry(doc.achievement_type.to_string()).or_insert(0) += 1;
        }
        Ok(sorted_counts(counts))
    }

    async fn count_by_competition_level(&self, scope: Option<&[Uuid]>) -> Result<Vec<KeyCount>, DatabaseError> {
        let mut counts = HashMap::new();
        for doc in self
            .live()
            .iter()
            .filter(|d| in_scope(d.student_id, scope) && d.achievement_type == AchievementType::Competition)
        {
            if let Some(level) = doc.details.competition_level {
                let key = serde_json::to_value(level)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        Ok(sorted_counts(counts))
    }

    async fn top_students_by_points(
        &self,
        limit: i64,
        scope: Option<&[Uuid]>,
    ) -> Result<Vec<StudentPoints>, DatabaseError> {
        let limit = if limit <= 0 { DEFAULT_TOP_STUDENTS } else { limit };
        let mut totals: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for doc in self.live().iter().filter(|d| in_scope(d.student_id, scope)) {
            let entry = totals.entry(doc.student_id).or_insert((0, 0));
            entry.0 += doc.points;
            entry.1 += 1;
        }
        let mut top: Vec<StudentPoints> = totals
            .into_iter()
            .map(|(student_id, (total_points, achievement_count))| StudentPoints {
                student_id,
                total_points,
                achievement_count,
            })
            .collect();
        top.sort_by(|a, b| b.total_points.cmp(&a.total_points).then_with(|| a.student_id.cmp(&b.student_id)));
        top.truncate(limit as usize);
        Ok(top)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    roles: Mutex<HashMap<Uuid, String>>,
    users: Mutex<HashMap<Uuid, String>>,
    students: Mutex<Vec<Student>>,
    lecturers: Mutex<Vec<Lecturer>>,
}

impl MemoryIdentityStore {
    pub fn add_role(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        lock(&self.roles).insert(id, name.to_string());
        id
    }

    pub fn add_user(&self, full_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        lock(&self.users).insert(id, full_name.to_string());
        id
    }

    pub fn add_student(&self, user_id: Uuid, full_name: &str, advisor_id: Option<Uuid>) -> Student {
        let student = Student {
            id: Uuid::new_v4(),
            user_id,
            full_name: full_name.to_string(),
            student_number: format!("S{}", &Uuid::new_v4().simple().to_string()[..8]),
            program_study: Some("Informatika".to_string()),
            academic_year: Some("2023".to_string()),
            advisor_id,
        };
        lock(&self.students).push(student.clone());
        student
    }

    pub fn add_lecturer(&self, user_id: Uuid, full_name: &str) -> Lecturer {
        let lecturer = Lecturer {
            id: Uuid::new_v4(),
            user_id,
            full_name: full_name.to_string(),
            lecturer_number: format!("L{}", &Uuid::new_v4().simple().to_string()[..8]),
            department: Some("Teknik Informatika".to_string()),
        };
        lock(&self.lecturers).push(lecturer.clone());
        lecturer
    }

    fn advisee_ids(&self, advisor_id: Uuid) -> Vec<Uuid> {
        lock(&self.students)
            .iter()
            .filter(|s| s.advisor_id == Some(advisor_id))
            .map(|s| s.id)
            .collect()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn role_name(&self, role_id: Uuid) -> Result<Option<String>, DatabaseError> {
        Ok(lock(&self.roles).get(&role_id).cloned())
    }

    async fn user_full_name(&self, user_id: Uuid) -> Result<Option<String>, DatabaseError> {
        Ok(lock(&self.users).get(&user_id).cloned())
    }

    async fn student_by_user(&self, user_id: Uuid) -> Result<Option<Student>, DatabaseError> {
        Ok(lock(&self.students).iter().find(|s| s.user_id == user_id).cloned())
    }

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>, DatabaseError> {
        Ok(lock(&self.students).iter().find(|s| s.id == id).cloned())
    }

    async fn students_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Student>, DatabaseError> {
        Ok(lock(&self.students).iter().filter(|s| ids.contains(&s.id)).cloned().collect())
    }

    async fn students_by_advisor(&self, advisor_id: Uuid) -> Result<Vec<Student>, DatabaseError> {
        Ok(lock(&self.students)
            .iter()
            .filter(|s| s.advisor_id == Some(advisor_id))
            .cloned()
            .collect())
    }

    async fn lecturer_by_user(&self, user_id: Uuid) -> Result<Option<Lecturer>, DatabaseError> {
        Ok(lock(&self.lecturers).iter().find(|l| l.user_id == user_id).cloned())
    }

    async fn lecturer_by_id(&self, id: Uuid) -> Result<Option<Lecturer>, DatabaseError> {
        Ok(lock(&self.lecturers).iter().find(|l| l.id == id).cloned())
    }
}

pub struct MemoryReferenceStore {
    rows: Mutex<Vec<AchievementReference>>,
    identity: Arc<MemoryIdentityStore>,
    clock: Clock,
    fail_create: AtomicBool,
    fail_status: AtomicBool,
    lose_race: AtomicBool,
}

fn status_rank(status: AchievementStatus) -> u8 {
    match status {
        AchievementStatus::Draft => 0,
        AchievementStatus::Submitted => 1,
        AchievementStatus::Verified => 2,
        AchievementStatus::Rejected => 3,
        AchievementStatus::Deleted => 4,
    }
}

fn newest_first(rows: &mut [AchievementReference]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

impl MemoryReferenceStore {
    pub fn new(identity: Arc<MemoryIdentityStore>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            identity,
            clock: Clock::default(),
            fail_create: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            lose_race: AtomicBool::new(false),
        }
    }

    pub fn all(&self) -> Vec<AchievementReference> {
        lock(&self.rows).clone()
    }

    pub fn by_id(&self, id: Uuid) -> Option<AchievementReference> {
        lock(&self.rows).iter().find(|r| r.id == id).cloned()
    }

    /// Latest row for the document, deleted rows included
    pub fn by_document(&self, document_id: &str) -> Option<AchievementReference> {
        lock(&self.rows).iter().rev().find(|r| r.document_id == document_id).cloned()
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_status_update(&self) {
        self.fail_status.store(true, Ordering::SeqCst);
    }

    /// The next status update behaves as if another writer got there first.
    pub fn lose_next_status_race(&self) {
        self.lose_race.store(true, Ordering::SeqCst);
    }

    fn live(&self) -> Vec<AchievementReference> {
        lock(&self.rows)
            .iter()
            .filter(|r| r.status != AchievementStatus::Deleted)
            .cloned()
            .collect()
    }

    /// Compare-and-set under the row lock.
    fn transition(
        &self,
        id: Uuid,
        expected: AchievementStatus,
        apply: impl FnOnce(&mut AchievementReference, DateTime<Utc>),
    ) -> Result<Option<AchievementReference>, DatabaseError> {
        injected(&self.fail_status, "status update")?;
        if self.lose_race.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let now = self.clock.tick();
        let mut rows = lock(&self.rows);
        let Some(row) = rows.iter_mut().find(|r| r.id == id && r.status == expected) else {
            return Ok(None);
        };
        apply(row, now);
        row.updated_at = now;
        Ok(Some(row.clone()))
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn create(
        &self,
        student_id: Uuid,
        document_id: &str,
        status: AchievementStatus,
    ) -> Result<AchievementReference, DatabaseError> {
        injected(&self.fail_create, "reference insert")?;
        let now = self.clock.tick();
        let row = AchievementReference {
            id: Uuid::new_v4(),
            student_id,
            document_id: document_id.to_string(),
            status,
            submitted_at: None,
            verified_at: None,
            verified_by: None,
            rejection_note: None,
            created_at: now,
            updated_at: now,
        };
        let mut rows = lock(&self.rows);
        if rows
            .iter()
            .any(|r| r.document_id == document_id && r.status != AchievementStatus::Deleted)
        {
            return Err(DatabaseError::Unavailable(format!(
                "duplicate live reference for document {}",
                document_id
            )));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn get_by_document_id(&self, document_id: &str) -> Result<Option<AchievementReference>, DatabaseError> {
        Ok(self.live().into_iter().find(|r| r.document_id == document_id))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<AchievementReference>, DatabaseError> {
        Ok(self.by_id(id))
    }

    async fn list_by_student(
        &self,
        student_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError> {
        let mut rows: Vec<_> = self.live().into_iter().filter(|r| r.student_id == student_id).collect();
        newest_first(&mut rows);
        Ok(paginate(rows, page))
    }

    async fn list_by_advisor(
        &self,
        advisor_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError> {
        let advisees = self.identity.advisee_ids(advisor_id);
        let mut rows: Vec<_> = self
            .live()
            .into_iter()
            .filter(|r| advisees.contains(&r.student_id))
            .collect();
        newest_first(&mut rows);
        Ok(paginate(rows, page))
    }

    async fn list_all(
        &self,
        page: PageRequest,
        filter: ReferenceFilter,
    ) -> Result<(Vec<AchievementReference>, i64), DatabaseError> {
        let mut rows: Vec<_> = self
            .live()
            .into_iter()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .collect();

        rows.sort_by(|a, b| {
            let primary = match filter.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Status => status_rank(a.status).cmp(&status_rank(b.status)),
                SortField::SubmittedAt => match (a.submitted_at, b.submitted_at) {
                    // Nulls last in either direction
                    (None, None) => std::cmp::Ordering::Equal,
                    (None, Some(_)) => return std::cmp::Ordering::Greater,
                    (Some(_), None) => return std::cmp::Ordering::Less,
                    (Some(x), Some(y)) => x.cmp(&y),
                },
            };
            let ordering = primary.then_with(|| a.id.cmp(&b.id));
            match filter.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        Ok(paginate(rows, page))
    }

    async fn list_by_students(&self, student_ids: &[Uuid]) -> Result<Vec<AchievementReference>, DatabaseError> {
        let mut rows: Vec<_> = self
            .live()
            .into_iter()
            .filter(|r| student_ids.contains(&r.student_id))
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: AchievementStatus,
        status: AchievementStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Option<AchievementReference>, DatabaseError> {
        self.transition(id, expected, |row, _| {
            row.status = status;
            if submitted_at.is_some() {
                row.submitted_at = submitted_at;
            }
        })
    }

    async fn mark_verified(&self, id: Uuid, verified_by: Uuid) -> Result<Option<AchievementReference>, DatabaseError> {
        self.transition(id, AchievementStatus::Submitted, |row, now| {
            row.status = AchievementStatus::Verified;
            row.verified_at = Some(now);
            row.verified_by = Some(verified_by);
        })
    }

    async fn mark_rejected(
        &self,
        id: Uuid,
        verified_by: Uuid,
        rejection_note: &str,
    ) -> Result<Option<AchievementReference>, DatabaseError> {
        let note = rejection_note.to_string();
        self.transition(id, AchievementStatus::Submitted, |row, _| {
            row.status = AchievementStatus::Rejected;
            row.verified_by = Some(verified_by);
            row.rejection_note = Some(note);
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = lock(&self.rows);
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }

    async fn stats(&self, scope: Option<&[Uuid]>) -> Result<ReferenceStats, DatabaseError> {
        let rows: Vec<_> = self.live().into_iter().filter(|r| in_scope(r.student_id, scope)).collect();
        Ok(ReferenceStats {
            total: rows.len() as i64,
            verified: rows.iter().filter(|r| r.status == AchievementStatus::Verified).count() as i64,
        })
    }

    async fn count_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: PeriodBucket,
        scope: Option<&[Uuid]>,
    ) -> Result<BTreeMap<String, i64>, DatabaseError> {
        let mut counts = BTreeMap::new();
        for row in self
            .live()
            .iter()
            .filter(|r| in_scope(r.student_id, scope) && r.created_at >= start && r.created_at < end)
        {
            *counts.entry(bucket.key(row.created_at)).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    rows: Mutex<Vec<Notification>>,
    clock: Clock,
    fail_create: AtomicBool,
}

impl MemoryNotificationStore {
    pub fn all(&self) -> Vec<Notification> {
        lock(&self.rows).clone()
    }

    pub fn for_user(&self, user_id: Uuid) -> Vec<Notification> {
        lock(&self.rows).iter().filter(|n| n.user_id == user_id).cloned().collect()
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, n: NewNotification) -> Result<Notification, DatabaseError> {
        injected(&self.fail_create, "notification insert")?;
        let now = self.clock.tick();
        let row = Notification {
            id: Uuid::new_v4(),
            user_id: n.user_id,
            notification_type: n.notification_type,
            title: n.title,
            message: n.message,
            achievement_id: n.achievement_id,
            document_id: n.document_id,
            is_read: false,
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.rows).push(row.clone());
        Ok(row)
    }

    async fn list_by_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Notification>, i64), DatabaseError> {
        let mut rows = self.for_user(user_id);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, DatabaseError> {
        Ok(self.for_user(user_id).iter().filter(|n| !n.is_read).count() as i64)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, DatabaseError> {
        let now = self.clock.tick();
        let mut rows = lock(&self.rows);
        let Some(row) = rows.iter_mut().find(|n| n.id == id && n.user_id == user_id) else {
            return Ok(None);
        };
        if !row.is_read {
            row.is_read = true;
            row.read_at = Some(now);
            row.updated_at = now;
        }
        Ok(Some(row.clone()))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, DatabaseError> {
        let now = self.clock.tick();
        let mut changed = 0;
        for row in lock(&self.rows).iter_mut().filter(|n| n.user_id == user_id && !n.is_read) {
            row.is_read = true;
            row.read_at = Some(now);
            row.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }
}

/// A seeded user: the principal plus the id of their profile row
#[derive(Debug, Clone)]
pub struct TestUser {
    pub actor: Actor,
    pub name: String,
    pub profile_id: Uuid,
}

/// Wires the in-memory stores together with the three canonical roles
pub struct TestContext {
    pub documents: Arc<MemoryDocumentStore>,
    pub references: Arc<MemoryReferenceStore>,
    pub notifications: Arc<MemoryNotificationStore>,
    pub identity: Arc<MemoryIdentityStore>,
    pub student_role: Uuid,
    pub advisor_role: Uuid,
    pub admin_role: Uuid,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        let identity = Arc::new(MemoryIdentityStore::default());
        let student_role = identity.add_role("Mahasiswa");
        let advisor_role = identity.add_role("Dosen Wali");
        let admin_role = identity.add_role("Admin");
        Self {
            documents: Arc::new(MemoryDocumentStore::default()),
            references: Arc::new(MemoryReferenceStore::new(identity.clone())),
            notifications: Arc::new(MemoryNotificationStore::default()),
            identity,
            student_role,
            advisor_role,
            admin_role,
        }
    }

    pub fn services(&self) -> Services {
        Services::new(
            self.documents.clone(),
            self.references.clone(),
            self.notifications.clone(),
            self.identity.clone(),
        )
    }

    pub fn state(&self, config: AppConfig) -> AppState {
        AppState::new(
            config,
            self.documents.clone(),
            self.references.clone(),
            self.notifications.clone(),
            self.identity.clone(),
        )
    }

    /// A user holding `role_id` with no profile row
    pub fn add_user_with_role(&self, full_name: &str, role_id: Uuid) -> Actor {
        Actor {
            user_id: self.identity.add_user(full_name),
            role_id,
        }
    }

    pub fn add_advisor(&self, full_name: &str) -> (TestUser, Lecturer) {
        let actor = self.add_user_with_role(full_name, self.advisor_role);
        let lecturer = self.identity.add_lecturer(actor.user_id, full_name);
        let user = TestUser {
            actor,
            name: full_name.to_string(),
            profile_id: lecturer.id,
        };
        (user, lecturer)
    }

    pub fn add_student(&self, full_name: &str, advisor: Option<&TestUser>) -> (TestUser, Student) {
        let actor = self.add_user_with_role(full_name, self.student_role);
        let student = self
            .identity
            .add_student(actor.user_id, full_name, advisor.map(|a| a.profile_id));
        let user = TestUser {
            actor,
            name: full_name.to_string(),
            profile_id: student.id,
        };
        (user, student)
    }

    pub fn add_admin(&self, full_name: &str) -> Actor {
        self.add_user_with_role(full_name, self.admin_role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reference_lookup_and_admin_cleanup() {
        let ctx = TestContext::new();
        let (_, student) = ctx.add_student("Budi", None);
        let doc_id = ObjectId::new().to_hex();

        let row = ctx
            .references
            .create(student.id, &doc_id, AchievementStatus::Draft)
            .await
            .unwrap();
        let found = ctx.references.get_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(found.document_id, doc_id);

        ctx.references
            .set_status(row.id, AchievementStatus::Draft, AchievementStatus::Deleted, None)
            .await
            .unwrap()
            .unwrap();
        // Deleted rows drop out of document lookups but stay addressable by id
        assert!(ctx.references.get_by_document_id(&doc_id).await.unwrap().is_none());
        assert!(ctx.references.get_by_id(row.id).await.unwrap().is_some());

        assert!(ctx.references.delete(row.id).await.unwrap());
        assert!(ctx.references.get_by_id(row.id).await.unwrap().is_none());
        assert!(!ctx.references.delete(row.id).await.unwrap());
    }

    #[tokio::test]
    async fn period_counts_respect_window_and_scope() {
        let ctx = TestContext::new();
        let (_, budi) = ctx.add_student("Budi", None);
        let (_, sari) = ctx.add_student("Sari", None);
        for student in [&budi, &budi, &sari] {
            ctx.references
                .create(student.id, &ObjectId::new().to_hex(), AchievementStatus::Draft)
                .await
                .unwrap();
        }

        let start = Utc::now() - Duration::days(1);
        let end = Utc::now() + Duration::days(1);

        let all = ctx
            .references
            .count_by_period(start, end, PeriodBucket::Day, None)
            .await
            .unwrap();
        assert_eq!(all.values().sum::<i64>(), 3);

        let scope = [budi.id];
        let scoped = ctx
            .references
            .count_by_period(start, end, PeriodBucket::Day, Some(&scope[..]))
            .await
            .unwrap();
        assert_eq!(scoped.values().sum::<i64>(), 2);

        let empty = ctx
            .references
            .count_by_period(end, end + Duration::days(1), PeriodBucket::Day, None)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn soft_deleted_documents_are_invisible_until_restored() {
        let ctx = TestContext::new();
        let (_, student) = ctx.add_student("Budi", None);
        let doc = ctx
            .documents
            .create(AchievementDraft {
                student_id: student.id,
                achievement_type: AchievementType::Academic,
                title: "Dean's List".to_string(),
                description: "S1".to_string(),
                details: Default::default(),
                tags: Vec::new(),
                points: 10,
            })
            .await
            .unwrap();

        assert!(ctx.documents.soft_delete(&doc.id).await.unwrap());
        assert!(ctx.documents.get(&doc.id).await.unwrap().is_none());
        assert!(ctx.documents.get_many(&[doc.id.clone()]).await.unwrap().is_empty());
        assert!(!ctx.documents.soft_delete(&doc.id).await.unwrap());

        assert!(ctx.documents.restore(&doc.id).await.unwrap());
        assert_eq!(ctx.documents.get(&doc.id).await.unwrap().unwrap().title, "Dean's List");
    }
}
