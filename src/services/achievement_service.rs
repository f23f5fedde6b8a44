//! Achievement lifecycle.
//!
//! Every operation resolves the caller, loads the workflow reference by
//! document id and checks the state machine before touching either store:
//!
//! ```text
//! (create) -> draft -> submitted -> verified
//!               |           \
//!               v            -> rejected
//!            deleted
//! ```
//!
//! The document and the reference live in different stores, so create and
//! delete order their writes and compensate on failure instead of relying on
//! a shared transaction. Reference status changes are predicate updates; a
//! concurrent mutator that loses the race gets `InvalidState`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::identity::{Caller, IdentityResolver};
use super::notification_service::NotificationService;
use crate::database::models::{
    Achievement, AchievementDraft, AchievementPatch, AchievementReference, AchievementStatus,
    AchievementType, AchievementUpdate, Attachment, NewAchievement, ReferenceFilter,
};
use crate::database::{DocumentStore, ReferenceStore};
use crate::types::{Page, PageRequest, Pagination, Role};

/// Authenticated principal as delivered by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// Document merged with its workflow fields
#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub reference_id: Uuid,
    pub status: AchievementStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    /// Verifier's full name when resolvable, otherwise their user id
    pub verified_by: Option<String>,
    pub rejection_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
}

impl AchievementView {
    pub fn new(achievement: Achievement, reference: &AchievementReference) -> Self {
        Self {
            achievement,
            reference_id: reference.id,
            status: reference.status,
            submitted_at: reference.submitted_at,
            verified_at: reference.verified_at,
            verified_by: reference.verified_by.map(|id| id.to_string()),
            rejection_note: reference.rejection_note.clone(),
            student_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub status: AchievementStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<Uuid>,
    pub changed_by_name: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery {
    pub page: PageRequest,
    /// Honoured for admins only
    pub filter: ReferenceFilter,
}

pub struct AchievementService {
    documents: Arc<dyn DocumentStore>,
    references: Arc<dyn ReferenceStore>,
    identity: Arc<IdentityResolver>,
    notifications: Arc<NotificationService>,
}

fn non_blank(value: &str, field: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn parse_type(value: &str) -> ServiceResult<AchievementType> {
    value.trim().parse().map_err(ServiceError::Validation)
}

fn check_points(points: i64) -> ServiceResult<i64> {
    if points < 0 {
        return Err(ServiceError::validation("points must be zero or greater"));
    }
    Ok(points)
}

/// Trims, drops blanks and keeps the first occurrence of each tag.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

fn validate_new(payload: NewAchievement, student_id: Uuid) -> ServiceResult<AchievementDraft> {
    Ok(AchievementDraft {
        student_id,
        achievement_type: parse_type(&payload.achievement_type)?,
        title: non_blank(&payload.title, "title")?,
        description: non_blank(&payload.description, "description")?,
        details: payload.details,
        tags: normalize_tags(payload.tags),
        points: check_points(payload.points)?,
    })
}

fn validate_update(update: AchievementUpdate) -> ServiceResult<AchievementPatch> {
    Ok(AchievementPatch {
        achievement_type: update.achievement_type.as_deref().map(parse_type).transpose()?,
        title: update.title.as_deref().map(|t| non_blank(t, "title")).transpose()?,
        description: update
            .description
            .as_deref()
            .map(|d| non_blank(d, "description"))
            .transpose()?,
        details: update.details,
        tags: update.tags.map(normalize_tags),
        points: update.points.map(check_points).transpose()?,
    })
}

fn require_draft(reference: &AchievementReference, action: &str) -> ServiceResult<()> {
    if reference.status != AchievementStatus::Draft {
        return Err(ServiceError::invalid_state(format!(
            "cannot {} an achievement in status '{}'",
            action, reference.status
        )));
    }
    Ok(())
}

fn require_submitted(reference: &AchievementReference, action: &str) -> ServiceResult<()> {
    if reference.status != AchievementStatus::Submitted {
        return Err(ServiceError::invalid_state(format!(
            "cannot {} an achievement in status '{}'",
            action, reference.status
        )));
    }
    Ok(())
}

impl AchievementService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        references: Arc<dyn ReferenceStore>,
        identity: Arc<IdentityResolver>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            documents,
            references,
            identity,
            notifications,
        }
    }

    async fn load_reference(&self, document_id: &str) -> ServiceResult<AchievementReference> {
        self.references
            .get_by_document_id(document_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("achievement not found"))
    }

    async fn load_document(&self, reference: &AchievementReference) -> ServiceResult<Achievement> {
        match self.documents.get(&reference.document_id).await? {
            Some(doc) => Ok(doc),
            None => {
                tracing::error!(
                    target: "reconcile",
                    reference_id = %reference.id,
                    document_id = %reference.document_id,
                    "live reference without a live document"
                );
                Err(ServiceError::not_found("achievement not found"))
            }
        }
    }

    fn require_owner(&self, caller: &Caller, reference: &AchievementReference) -> ServiceResult<()> {
        let student = caller.require_student()?;
        if student.id != reference.student_id {
            return Err(ServiceError::forbidden("achievement belongs to another student"));
        }
        Ok(())
    }

    /// Caller must be the advisor assigned to the owning student.
    async fn require_advisor_of_owner(&self, caller: &Caller, reference: &AchievementReference) -> ServiceResult<()> {
        let lecturer = caller.require_advisor()?;
        let student = self
            .identity
            .store()
            .student_by_id(reference.student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("student for achievement not found"))?;
        if student.advisor_id != Some(lecturer.id) {
            return Err(ServiceError::forbidden("achievement belongs to a student you do not advise"));
        }
        Ok(())
    }

    async fn authorize_view(&self, caller: &Caller, reference: &AchievementReference) -> ServiceResult<()> {
        match caller.role {
            Role::Student => self.require_owner(caller, reference),
            Role::Advisor => self.require_advisor_of_owner(caller, reference).await,
            Role::Admin => Ok(()),
        }
    }

    async fn verifier_name(&self, verified_by: Option<Uuid>) -> Option<String> {
        let id = verified_by?;
        Some(self.identity.full_name(id).await.unwrap_or_else(|| id.to_string()))
    }

    pub async fn create(
        &self,
        actor: Actor,
        payload: NewAchievement,
    ) -> ServiceResult<(Achievement, AchievementReference)> {
        // Shape problems are reported before anything is resolved
        let draft = validate_new(payload, Uuid::nil())?;

        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let student = caller.require_student()?;
        let draft = AchievementDraft {
            student_id: student.id,
            ..draft
        };

        let document = self.documents.create(draft).await?;

        let reference = match self
            .references
            .create(student.id, &document.id, AchievementStatus::Draft)
            .await
        {
            Ok(reference) => reference,
            Err(err) => {
                match self.documents.soft_delete(&document.id).await {
                    Ok(_) => tracing::warn!(
                        document_id = %document.id,
                        error = %err,
                        "reference insert failed, document soft-deleted"
                    ),
                    Err(compensation) => tracing::error!(
                        target: "reconcile",
                        document_id = %document.id,
                        error = %err,
                        compensation_error = %compensation,
                        "reference insert failed and orphan document could not be soft-deleted"
                    ),
                }
                return Err(ServiceError::internal(format!("failed to record achievement: {}", err)));
            }
        };

        tracing::info!(
            document_id = %document.id,
            reference_id = %reference.id,
            student_id = %student.id,
            "achievement created"
        );
        Ok((document, reference))
    }

    pub async fn update(&self, actor: Actor, document_id: &str, update: AchievementUpdate) -> ServiceResult<AchievementView> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        self.require_owner(&caller, &reference)?;
        require_draft(&reference, "update")?;

        // An empty patch still refreshes updated_at
        let patch = validate_update(update)?;
        let document = match self.documents.update(document_id, &patch).await? {
            Some(doc) => doc,
            None => self.load_document(&reference).await?,
        };
        tracing::info!(%document_id, "achievement updated");
        Ok(AchievementView::new(document, &reference))
    }

    /// Authorization and state guard for `attach`, usable before any file
    /// is stored.
    pub async fn check_attachable(&self, actor: Actor, document_id: &str) -> ServiceResult<AchievementReference> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        match caller.role {
            Role::Student => self.require_owner(&caller, &reference)?,
            Role::Advisor => self.require_advisor_of_owner(&caller, &reference).await?,
            Role::Admin => return Err(ServiceError::forbidden("admins cannot attach files")),
        }
        require_draft(&reference, "attach files to")?;
        Ok(reference)
    }

    pub async fn attach(&self, actor: Actor, document_id: &str, attachment: Attachment) -> ServiceResult<Attachment> {
        let reference = self.check_attachable(actor, document_id).await?;

        if attachment.file_name.trim().is_empty() || attachment.file_url.trim().is_empty() {
            return Err(ServiceError::validation("attachment file_name and file_url are required"));
        }

        if !self.documents.append_attachment(document_id, &attachment).await? {
            self.load_document(&reference).await?;
            return Err(ServiceError::not_found("achievement not found"));
        }

        tracing::info!(%document_id, file = %attachment.file_name, "attachment added");
        Ok(attachment)
    }

    pub async fn submit(&self, actor: Actor, document_id: &str) -> ServiceResult<AchievementReference> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        self.require_owner(&caller, &reference)?;
        require_draft(&reference, "submit")?;

        let submitted = self
            .references
            .set_status(
                reference.id,
                AchievementStatus::Draft,
                AchievementStatus::Submitted,
                Some(Utc::now()),
            )
            .await?
            .ok_or_else(|| ServiceError::invalid_state("achievement is no longer a draft"))?;

        tracing::info!(%document_id, reference_id = %submitted.id, "achievement submitted");

        if let Err(e) = self.notifications.notify_submitted(&submitted).await {
            tracing::warn!(%document_id, error = %e, "submission notification failed");
        }
        Ok(submitted)
    }

    pub async fn verify(&self, actor: Actor, document_id: &str) -> ServiceResult<AchievementReference> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        self.require_advisor_of_owner(&caller, &reference).await?;
        require_submitted(&reference, "verify")?;

        let verified = self
            .references
            .mark_verified(reference.id, caller.user_id)
            .await?
            .ok_or_else(|| ServiceError::invalid_state("achievement is no longer awaiting verification"))?;

        tracing::info!(%document_id, verified_by = %caller.user_id, "achievement verified");
        Ok(verified)
    }

    pub async fn reject(&self, actor: Actor, document_id: &str, rejection_note: &str) -> ServiceResult<AchievementReference> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        self.require_advisor_of_owner(&caller, &reference).await?;
        let note = non_blank(rejection_note, "rejection_note")?;
        require_submitted(&reference, "reject")?;

        let rejected = self
            .references
            .mark_rejected(reference.id, caller.user_id, &note)
            .await?
            .ok_or_else(|| ServiceError::invalid_state("achievement is no longer awaiting verification"))?;

        tracing::info!(%document_id, verified_by = %caller.user_id, "achievement rejected");

        if let Err(e) = self.notifications.notify_rejected(&rejected, &note).await {
            tracing::warn!(%document_id, error = %e, "rejection notification failed");
        }
        Ok(rejected)
    }

    pub async fn delete(&self, actor: Actor, document_id: &str) -> ServiceResult<()> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        self.require_owner(&caller, &reference)?;
        require_draft(&reference, "delete")?;

        // Document goes first: a hidden document with a draft reference is
        // safe, a live document with a deleted reference is not.
        let hid_document = self.documents.soft_delete(document_id).await?;
        if !hid_document {
            tracing::warn!(
                target: "reconcile",
                %document_id,
                reference_id = %reference.id,
                "document already hidden while deleting draft"
            );
        }

        match self
            .references
            .set_status(reference.id, AchievementStatus::Draft, AchievementStatus::Deleted, None)
            .await
        {
            Ok(Some(_)) => {
                tracing::info!(%document_id, reference_id = %reference.id, "achievement deleted");
                Ok(())
            }
            Ok(None) => {
                // Someone moved the draft on; put the document back
                if hid_document {
                    if let Err(e) = self.documents.restore(document_id).await {
                        tracing::error!(
                            target: "reconcile",
                            %document_id,
                            reference_id = %reference.id,
                            error = %e,
                            "failed to restore document after losing delete race"
                        );
                    }
                }
                Err(ServiceError::invalid_state("achievement is no longer a draft"))
            }
            Err(e) => {
                tracing::error!(
                    target: "reconcile",
                    %document_id,
                    reference_id = %reference.id,
                    error = %e,
                    "document soft-deleted but reference status update failed"
                );
                Err(e.into())
            }
        }
    }

    pub async fn get(&self, actor: Actor, document_id: &str) -> ServiceResult<AchievementView> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        self.authorize_view(&caller, &reference).await?;
        let document = self.load_document(&reference).await?;

        let mut view = AchievementView::new(document, &reference);
        view.verified_by = self.verifier_name(reference.verified_by).await;
        view.student_name = self
            .identity
            .store()
            .student_by_id(reference.student_id)
            .await?
            .map(|s| s.full_name);
        Ok(view)
    }

    pub async fn list(&self, actor: Actor, query: ListQuery) -> ServiceResult<Page<AchievementView>> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let page = query.page;

        let (references, total) = match caller.role {
            Role::Student => {
                let student = caller.require_student()?;
                self.references.list_by_student(student.id, page).await?
            }
            Role::Advisor => {
                let lecturer = caller.require_advisor()?;
                self.references.list_by_advisor(lecturer.id, page).await?
            }
            Role::Admin => self.references.list_all(page, query.filter).await?,
        };

        let ids: Vec<String> = references.iter().map(|r| r.document_id.clone()).collect();
        let mut documents: HashMap<String, Achievement> = self
            .documents
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let student_ids: Vec<Uuid> = references
            .iter()
            .map(|r| r.student_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let student_names: HashMap<Uuid, String> = self
            .identity
            .store()
            .students_by_ids(&student_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s.full_name))
            .collect();

        let mut verifier_names: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut items = Vec::with_capacity(references.len());
        for reference in &references {
            let Some(document) = documents.remove(&reference.document_id) else {
                tracing::warn!(
                    target: "reconcile",
                    reference_id = %reference.id,
                    document_id = %reference.document_id,
                    "dropping listed reference without a live document"
                );
                continue;
            };

            let mut view = AchievementView::new(document, reference);
            if let Some(verifier) = reference.verified_by {
                if !verifier_names.contains_key(&verifier) {
                    let name = self.identity.full_name(verifier).await;
                    verifier_names.insert(verifier, name);
                }
                if let Some(Some(name)) = verifier_names.get(&verifier) {
                    view.verified_by = Some(name.clone());
                }
            }
            view.student_name = student_names.get(&reference.student_id).cloned();
            items.push(view);
        }

        Ok(Page {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn history(&self, actor: Actor, document_id: &str) -> ServiceResult<Vec<HistoryEntry>> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let reference = self.load_reference(document_id).await?;
        self.authorize_view(&caller, &reference).await?;

        let mut history = vec![HistoryEntry {
            status: AchievementStatus::Draft,
            changed_at: reference.created_at,
            changed_by: None,
            changed_by_name: None,
            note: None,
        }];

        if let Some(submitted_at) = reference.submitted_at {
            history.push(HistoryEntry {
                status: AchievementStatus::Submitted,
                changed_at: submitted_at,
                changed_by: None,
                changed_by_name: None,
                note: None,
            });
        }

        match (reference.status, reference.verified_at) {
            (AchievementStatus::Verified, Some(verified_at)) => history.push(HistoryEntry {
                status: AchievementStatus::Verified,
                changed_at: verified_at,
                changed_by: reference.verified_by,
                changed_by_name: self.actor_name(reference.verified_by).await,
                note: None,
            }),
            (AchievementStatus::Rejected, _) => history.push(HistoryEntry {
                status: AchievementStatus::Rejected,
                changed_at: reference.updated_at,
                changed_by: reference.verified_by,
                changed_by_name: self.actor_name(reference.verified_by).await,
                note: reference.rejection_note.clone(),
            }),
            _ => {}
        }

        Ok(history)
    }

    async fn actor_name(&self, user_id: Option<Uuid>) -> Option<String> {
        match user_id {
            Some(id) => self.identity.full_name(id).await,
            None => None,
        }
    }
}
