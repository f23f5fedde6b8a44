//! Read-only aggregates over both stores, scoped by the caller's role.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::achievement_service::{Actor, AchievementView};
use super::error::{ServiceError, ServiceResult};
use super::identity::{Caller, IdentityResolver};
use crate::database::document_store::DEFAULT_TOP_STUDENTS;
use crate::database::models::{
    AchievementStatus, KeyCount, Lecturer, PeriodBucket, Student, StudentPoints,
};
use crate::database::{DocumentStore, ReferenceStore};
use crate::types::Role;

const PERIOD_MONTHS: i32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementStats {
    pub total: i64,
    pub verified: i64,
    /// Verified share, floored to a whole percent
    pub percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopStudent {
    pub student_id: Uuid,
    pub student_name: Option<String>,
    pub total_points: i64,
    pub achievement_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub by_type: Vec<KeyCount>,
    pub by_period: BTreeMap<String, i64>,
    pub top_students: Vec<TopStudent>,
    pub competition_level_distribution: Vec<KeyCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub total_achievements: i64,
    pub total_points: i64,
    pub verified_count: i64,
    pub by_type: Vec<KeyCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student: Student,
    pub statistics: StudentSummary,
    pub achievements: Vec<AchievementView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LecturerSummary {
    pub total_advisees: i64,
    pub total_achievements: i64,
    pub total_points: i64,
    pub by_type: Vec<KeyCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LecturerReport {
    pub lecturer: Lecturer,
    pub statistics: LecturerSummary,
    pub top_advisees: Vec<TopStudent>,
}

fn month_start(index: i32) -> ServiceResult<DateTime<Utc>> {
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ServiceError::internal(format!("invalid month {}-{}", year, month)))
}

/// `[start, end)` covering the current month and the eleven before it,
/// plus the bucket key of every month in between.
fn last_twelve_months(now: DateTime<Utc>) -> ServiceResult<(DateTime<Utc>, DateTime<Utc>, Vec<String>)> {
    let current = now.year() * 12 + now.month0() as i32;
    let first = current - (PERIOD_MONTHS - 1);
    let mut keys = Vec::with_capacity(PERIOD_MONTHS as usize);
    for index in first..=current {
        keys.push(PeriodBucket::Month.key(month_start(index)?));
    }
    Ok((month_start(first)?, month_start(current + 1)?, keys))
}

fn percentage(verified: i64, total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        verified * 100 / total
    }
}

pub struct ReportService {
    documents: Arc<dyn DocumentStore>,
    references: Arc<dyn ReferenceStore>,
    identity: Arc<IdentityResolver>,
}

impl ReportService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        references: Arc<dyn ReferenceStore>,
        identity: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            documents,
            references,
            identity,
        }
    }

    /// Student ids the caller may aggregate over; `None` means everyone.
    async fn scope(&self, caller: &Caller) -> ServiceResult<Option<Vec<Uuid>>> {
        match caller.role {
            Role::Admin => Ok(None),
            Role::Student => Ok(Some(vec![caller.require_student()?.id])),
            Role::Advisor => {
                let lecturer = caller.require_advisor()?;
                Ok(Some(self.advisee_ids(lecturer.id).await?))
            }
        }
    }

    async fn advisee_ids(&self, lecturer_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        Ok(self
            .identity
            .store()
            .students_by_advisor(lecturer_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect())
    }

    async fn with_names(&self, points: Vec<StudentPoints>) -> ServiceResult<Vec<TopStudent>> {
        let ids: Vec<Uuid> = points.iter().map(|p| p.student_id).collect();
        let names: HashMap<Uuid, String> = self
            .identity
            .store()
            .students_by_ids(&ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s.full_name))
            .collect();
        Ok(points
            .into_iter()
            .map(|p| TopStudent {
                student_name: names.get(&p.student_id).cloned(),
                student_id: p.student_id,
                total_points: p.total_points,
                achievement_count: p.achievement_count,
            })
            .collect())
    }

    pub async fn achievement_stats(&self, actor: Actor) -> ServiceResult<AchievementStats> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let scope = self.scope(&caller).await?;
        let stats = self.references.stats(scope.as_deref()).await?;
        Ok(AchievementStats {
            total: stats.total,
            verified: stats.verified,
            percentage: percentage(stats.verified, stats.total),
        })
    }

    pub async fn statistics(&self, actor: Actor) -> ServiceResult<Statistics> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let scope = self.scope(&caller).await?;
        let scope = scope.as_deref();

        let (start, end, months) = last_twelve_months(Utc::now())?;
        let mut by_period: BTreeMap<String, i64> = months.into_iter().map(|k| (k, 0)).collect();
        for (key, count) in self
            .references
            .count_by_period(start, end, PeriodBucket::Month, scope)
            .await?
        {
            by_period.insert(key, count);
        }

        let top = self.documents.top_students_by_points(DEFAULT_TOP_STUDENTS, scope).await?;

        Ok(Statistics {
            by_type: self.documents.count_by_type(scope).await?,
            by_period,
            top_students: self.with_names(top).await?,
            competition_level_distribution: self.documents.count_by_competition_level(scope).await?,
        })
    }

    pub async fn student_report(&self, actor: Actor, student_id: Uuid) -> ServiceResult<StudentReport> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let student = self
            .identity
            .store()
            .student_by_id(student_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("student not found"))?;

        let allowed = match caller.role {
            Role::Admin => true,
            Role::Student => caller.require_student()?.id == student.id,
            Role::Advisor => Some(caller.require_advisor()?.id) == student.advisor_id,
        };
        if !allowed {
            return Err(ServiceError::forbidden("not allowed to view this student's report"));
        }

        self.build_student_report(student).await
    }

    pub async fn my_student_report(&self, actor: Actor) -> ServiceResult<StudentReport> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let student = caller.require_student()?.clone();
        self.build_student_report(student).await
    }

    async fn build_student_report(&self, student: Student) -> ServiceResult<StudentReport> {
        let scope = [student.id];
        let references = self.references.list_by_students(&scope).await?;
        let mut documents: HashMap<String, _> = self
            .documents
            .list_by_student(student.id)
            .await?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let mut achievements = Vec::with_capacity(references.len());
        for reference in &references {
            if let Some(doc) = documents.remove(&reference.document_id) {
                let mut view = AchievementView::new(doc, reference);
                view.student_name = Some(student.full_name.clone());
                achievements.push(view);
            }
        }

        let statistics = StudentSummary {
            total_achievements: achievements.len() as i64,
            total_points: achievements.iter().map(|a| a.achievement.points).sum(),
            verified_count: achievements
                .iter()
                .filter(|a| a.status == AchievementStatus::Verified)
                .count() as i64,
            by_type: self.documents.count_by_type(Some(&scope[..])).await?,
        };

        Ok(StudentReport {
            student,
            statistics,
            achievements,
        })
    }

    pub async fn lecturer_report(&self, actor: Actor, lecturer_id: Uuid) -> ServiceResult<LecturerReport> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let lecturer = self
            .identity
            .store()
            .lecturer_by_id(lecturer_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("lecturer not found"))?;

        let allowed = match caller.role {
            Role::Admin => true,
            Role::Advisor => caller.require_advisor()?.id == lecturer.id,
            Role::Student => false,
        };
        if !allowed {
            return Err(ServiceError::forbidden("not allowed to view this lecturer's report"));
        }

        self.build_lecturer_report(lecturer).await
    }

    pub async fn my_lecturer_report(&self, actor: Actor) -> ServiceResult<LecturerReport> {
        let caller = self.identity.resolve(actor.user_id, actor.role_id).await?;
        let lecturer = caller.require_advisor()?.clone();
        self.build_lecturer_report(lecturer).await
    }

    async fn build_lecturer_report(&self, lecturer: Lecturer) -> ServiceResult<LecturerReport> {
        let advisees = self.advisee_ids(lecturer.id).await?;
        if advisees.is_empty() {
            return Ok(LecturerReport {
                lecturer,
                statistics: LecturerSummary {
                    total_advisees: 0,
                    total_achievements: 0,
                    total_points: 0,
                    by_type: Vec::new(),
                },
                top_advisees: Vec::new(),
            });
        }

        let scope = Some(advisees.as_slice());
        let stats = self.references.stats(scope).await?;
        let all_points = self
            .documents
            .top_students_by_points(advisees.len() as i64, scope)
            .await?;
        let total_points = all_points.iter().map(|p| p.total_points).sum();
        let top: Vec<StudentPoints> = all_points.into_iter().take(DEFAULT_TOP_STUDENTS as usize).collect();

        Ok(LecturerReport {
            statistics: LecturerSummary {
                total_advisees: advisees.len() as i64,
                total_achievements: stats.total,
                total_points,
                by_type: self.documents.count_by_type(scope).await?,
            },
            top_advisees: self.with_names(top).await?,
            lecturer,
        })
    }
}
